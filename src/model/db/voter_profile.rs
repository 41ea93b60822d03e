use std::ops::Deref;

use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// Binds a user to exactly one election event's voter roll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterProfileCore {
    /// One-to-one with a user.
    pub user_id: Id,
    pub election_event_id: Id,
}

/// A voter profile without an ID.
pub type NewVoterProfile = VoterProfileCore;

/// A voter profile from the database, with its unique ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoterProfile {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub profile: VoterProfileCore,
}

impl Deref for VoterProfile {
    type Target = VoterProfileCore;

    fn deref(&self) -> &Self::Target {
        &self.profile
    }
}
