use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{api::id::ApiId, common::window::ElectionState};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteCastRequest {
    pub candidate_id: ApiId,
}

/// Returned after a successful cast. The hash is the voter's receipt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteConfirmation {
    pub id: ApiId,
    pub vote_hash: String,
    pub election_id: ApiId,
    pub election_title: String,
    pub candidate_name: String,
    pub created_at: DateTime<Utc>,
    pub message: String,
}

/// A vote as seen by its owner or an election admin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteDetail {
    pub id: ApiId,
    pub voter_email: String,
    pub candidate_id: ApiId,
    pub candidate_name: String,
    pub election_id: ApiId,
    pub election_title: String,
    pub vote_hash: String,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteStatus {
    pub has_voted: bool,
    pub election_id: ApiId,
    pub election_title: String,
    pub election_status: ElectionState,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyRequest {
    pub vote_hash: String,
}

/// Proof that a receipt corresponds to a recorded vote. Never reveals the voter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Verification {
    pub verified: bool,
    pub vote_id: ApiId,
    pub election_title: String,
    pub candidate_name: String,
    pub created_at: DateTime<Utc>,
    pub is_verified: bool,
}

/// Moderation request: set the `is_verified` flag of a vote.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationUpdate {
    pub is_verified: bool,
    #[serde(default)]
    pub details: String,
}
