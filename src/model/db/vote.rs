use std::ops::Deref;

use chrono::{DateTime, Utc};
use data_encoding::HEXLOWER;
use mongodb::bson::{serde_helpers::chrono_datetime_as_bson_datetime, DateTime as BsonDateTime};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::model::{db::candidate::Candidate, mongodb::Id};

/// Core vote data, as stored in the database.
///
/// `election_id` is copied from the candidate when the vote is cast. It exists so that
/// the `(voter_id, election_id)` unique index can enforce one vote per voter per election;
/// it is never written independently of `candidate_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteCore {
    pub voter_id: Id,
    pub candidate_id: Id,
    pub election_id: Id,
    /// Hex SHA-256 receipt, unique per vote.
    pub vote_hash: String,
    /// Moderation flag. The only mutable field of a vote.
    pub is_verified: bool,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

/// A vote from the database, with its unique ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vote {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub vote: VoteCore,
}

impl Vote {
    /// Create a new vote for the given candidate, stamped with the current time.
    pub fn new(voter_id: Id, candidate: &Candidate) -> Self {
        // Millisecond precision, so the hashed timestamp is exactly the stored one.
        let created_at = BsonDateTime::now().to_chrono();
        Self::new_at(voter_id, candidate, created_at)
    }

    /// Create a new vote with an explicit creation time.
    pub fn new_at(voter_id: Id, candidate: &Candidate, created_at: DateTime<Utc>) -> Self {
        let election_id = candidate.election_id;
        let vote_hash = vote_hash(election_id, voter_id, candidate.id, created_at);
        Self {
            id: Id::new(),
            vote: VoteCore {
                voter_id,
                candidate_id: candidate.id,
                election_id,
                vote_hash,
                is_verified: true,
                created_at,
            },
        }
    }
}

impl Deref for Vote {
    type Target = VoteCore;

    fn deref(&self) -> &Self::Target {
        &self.vote
    }
}

/// Compute the receipt hash `SHA256(election_id ∥ voter_id ∥ candidate_id ∥ created_at)`.
///
/// This proves a vote exists; it is not a secret.
pub fn vote_hash(
    election_id: Id,
    voter_id: Id,
    candidate_id: Id,
    created_at: DateTime<Utc>,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(election_id.to_string());
    hasher.update(voter_id.to_string());
    hasher.update(candidate_id.to_string());
    hasher.update(created_at.to_rfc3339());
    HEXLOWER.encode(&hasher.finalize())
}
