use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{db::user::normalize_email, mongodb::Id};

/// A one-time token granting registration eligibility for one election event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvitationCore {
    /// Always lowercase.
    pub email: String,
    /// Immutable registration token: a hyphenated UUID v4.
    pub token: String,
    /// Flipped exactly once, when a voter registers through this invitation.
    pub is_used: bool,
    pub election_event_id: Id,
    pub first_name: String,
    pub last_name: String,
    pub invited_by: Option<Id>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl InvitationCore {
    /// Create a fresh, unused invitation with a random token.
    pub fn new(
        email: &str,
        first_name: String,
        last_name: String,
        election_event_id: Id,
        invited_by: Option<Id>,
    ) -> Self {
        Self {
            email: normalize_email(email),
            token: Uuid::new_v4().to_string(),
            is_used: false,
            election_event_id,
            first_name: first_name.trim().to_string(),
            last_name: last_name.trim().to_string(),
            invited_by,
            created_at: Utc::now(),
        }
    }
}

/// An invitation without an ID.
pub type NewInvitation = InvitationCore;

/// An invitation from the database, with its unique ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invitation {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub invitation: InvitationCore,
}

impl Deref for Invitation {
    type Target = InvitationCore;

    fn deref(&self) -> &Self::Target {
        &self.invitation
    }
}

impl DerefMut for Invitation {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.invitation
    }
}
