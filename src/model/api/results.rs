use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::api::id::ApiId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateResult {
    pub candidate_id: ApiId,
    pub candidate_name: String,
    pub vote_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElectionResults {
    pub election_id: ApiId,
    pub election_title: String,
    /// Sum of the counted (verified) votes.
    pub total_votes: u64,
    /// Every candidate, most votes first.
    pub results: Vec<CandidateResult>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelinePoint {
    /// Start of the bucket.
    pub bucket: DateTime<Utc>,
    pub vote_count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationStats {
    pub verified_votes: u64,
    pub unverified_votes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElectionStatistics {
    pub election_id: ApiId,
    pub election_title: String,
    /// All votes, verified or not.
    pub total_votes: u64,
    pub candidate_results: Vec<CandidateResult>,
    pub voting_timeline: Vec<TimelinePoint>,
    pub verification_stats: VerificationStats,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participation {
    pub election_event_id: ApiId,
    pub total_invited_voters: u64,
    pub unique_voters_participated: u64,
    /// Percentage in `[0, 100]`.
    pub participation_rate: f64,
    /// Verified votes per election, keyed by election title.
    pub votes_per_election: BTreeMap<String, u64>,
    pub total_votes_cast: u64,
}
