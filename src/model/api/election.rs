use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    api::id::ApiId,
    common::window::{ElectionState, VotingWindow},
    db::{
        candidate::{Candidate, NewCandidate},
        election::Election,
        election_event::{ElectionEvent, NewElectionEvent},
    },
};

fn default_active() -> bool {
    true
}

/// An election event specification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventSpec {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

impl TryFrom<EventSpec> for NewElectionEvent {
    type Error = Error;

    fn try_from(spec: EventSpec) -> Result<Self> {
        if spec.title.trim().is_empty() {
            return Err(Error::bad_request("Election event title cannot be empty"));
        }
        if spec.start_time >= spec.end_time {
            return Err(Error::bad_request(
                "Election event start time must be before end time",
            ));
        }
        Ok(Self {
            title: spec.title,
            description: spec.description,
            start_time: spec.start_time,
            end_time: spec.end_time,
            is_active: spec.is_active,
        })
    }
}

/// An election specification. Omitted bounds default to the event's.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElectionSpec {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

/// A partial update to an election. The activity flag is changed separately.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ElectionUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ActiveToggle {
    pub is_active: bool,
}

/// An election event as returned by the API, including its derived state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventDescription {
    pub id: ApiId,
    pub title: String,
    pub description: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub is_active: bool,
    pub state: ElectionState,
}

impl From<ElectionEvent> for EventDescription {
    fn from(event: ElectionEvent) -> Self {
        let state = event.state_at(Utc::now());
        Self {
            id: event.id.into(),
            title: event.event.title,
            description: event.event.description,
            start_time: event.event.start_time,
            end_time: event.event.end_time,
            is_active: event.event.is_active,
            state,
        }
    }
}

/// An election as returned by the API, including its derived state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElectionDescription {
    pub id: ApiId,
    pub election_event_id: ApiId,
    pub title: String,
    pub description: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub is_active: bool,
    pub state: ElectionState,
}

impl From<Election> for ElectionDescription {
    fn from(election: Election) -> Self {
        let state = election.state_at(Utc::now());
        Self {
            id: election.id.into(),
            election_event_id: election.election_event_id.into(),
            title: election.election.title,
            description: election.election.description,
            start_time: election.election.start_time,
            end_time: election.election.end_time,
            is_active: election.election.is_active,
            state,
        }
    }
}

/// A candidate specification. The election comes from the route.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateSpec {
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub bio: String,
    pub user_id: Option<ApiId>,
}

impl CandidateSpec {
    pub fn into_candidate(self, election: &Election) -> Result<NewCandidate> {
        if self.first_name.trim().is_empty() || self.last_name.trim().is_empty() {
            return Err(Error::bad_request("Candidate name cannot be empty"));
        }
        Ok(NewCandidate {
            election_id: election.id,
            first_name: self.first_name,
            last_name: self.last_name,
            bio: self.bio,
            user_id: self.user_id.map(Into::into),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateDescription {
    pub id: ApiId,
    pub election_id: ApiId,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    pub bio: String,
    pub user_id: Option<ApiId>,
}

impl From<Candidate> for CandidateDescription {
    fn from(candidate: Candidate) -> Self {
        let full_name = candidate.full_name();
        Self {
            id: candidate.id.into(),
            election_id: candidate.election_id.into(),
            full_name,
            first_name: candidate.candidate.first_name,
            last_name: candidate.candidate.last_name,
            bio: candidate.candidate.bio,
            user_id: candidate.candidate.user_id.map(Into::into),
        }
    }
}

#[cfg(test)]
pub mod examples {
    use chrono::Duration;

    use super::*;

    impl EventSpec {
        pub fn current_example() -> Self {
            let now = Utc::now();
            Self {
                title: "Council Elections".to_string(),
                description: "Elections for the town council.".to_string(),
                start_time: now - Duration::hours(1),
                end_time: now + Duration::days(3),
                is_active: true,
            }
        }
    }

    impl ElectionSpec {
        pub fn example() -> Self {
            Self {
                title: "Mayor".to_string(),
                description: String::new(),
                start_time: None,
                end_time: None,
                is_active: true,
            }
        }
    }

    impl CandidateSpec {
        pub fn example(first_name: &str, last_name: &str) -> Self {
            Self {
                first_name: first_name.to_string(),
                last_name: last_name.to_string(),
                bio: String::new(),
                user_id: None,
            }
        }
    }
}
