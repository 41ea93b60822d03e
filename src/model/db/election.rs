use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use rocket::http::Status;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    common::window::VotingWindow,
    db::election_event::ElectionEvent,
    mongodb::Id,
};

/// Core election data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionCore {
    /// Owning event; deleting the event deletes the election.
    pub election_event_id: Id,
    pub title: String,
    pub description: String,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub start_time: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub end_time: DateTime<Utc>,
    pub is_active: bool,
}

impl ElectionCore {
    /// Create a new election inside the given event.
    /// Omitted bounds default to the event's own bounds.
    pub fn new(
        event: &ElectionEvent,
        title: String,
        description: String,
        start_time: Option<DateTime<Utc>>,
        end_time: Option<DateTime<Utc>>,
        is_active: bool,
    ) -> Result<Self> {
        let election = Self {
            election_event_id: event.id,
            title,
            description,
            start_time: start_time.unwrap_or(event.start_time),
            end_time: end_time.unwrap_or(event.end_time),
            is_active,
        };
        election.validate(event)?;
        Ok(election)
    }

    /// Check that the voting window is well-formed and nests inside the event's window.
    pub fn validate(&self, event: &ElectionEvent) -> Result<()> {
        if self.election_event_id != event.id {
            return Err(Error::Status(
                Status::BadRequest,
                "Election does not belong to the given election event".to_string(),
            ));
        }
        if self.title.trim().is_empty() {
            return Err(Error::Status(
                Status::BadRequest,
                "Election title cannot be empty".to_string(),
            ));
        }
        if self.start_time < event.start_time {
            return Err(Error::Status(
                Status::BadRequest,
                "Election start time cannot be before election event start time".to_string(),
            ));
        }
        if self.end_time > event.end_time {
            return Err(Error::Status(
                Status::BadRequest,
                "Election end time cannot be after election event end time".to_string(),
            ));
        }
        if self.start_time >= self.end_time {
            return Err(Error::Status(
                Status::BadRequest,
                "Election start time must be before end time".to_string(),
            ));
        }
        Ok(())
    }
}

impl VotingWindow for ElectionCore {
    fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    fn end_time(&self) -> DateTime<Utc> {
        self.end_time
    }

    fn is_active(&self) -> bool {
        self.is_active
    }
}

/// An election without an ID.
pub type NewElection = ElectionCore;

/// An election from the database, with its unique ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Election {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub election: ElectionCore,
}

impl Deref for Election {
    type Target = ElectionCore;

    fn deref(&self) -> &Self::Target {
        &self.election
    }
}

impl DerefMut for Election {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.election
    }
}
