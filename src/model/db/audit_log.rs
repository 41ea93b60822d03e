use std::ops::Deref;

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::{common::audit::AuditAction, mongodb::Id};

/// Core audit log data, as stored in the database. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteAuditLogCore {
    pub vote_id: Id,
    pub action: AuditAction,
    /// The acting user, if known.
    pub performed_by: Option<Id>,
    pub details: String,
    pub ip_address: Option<String>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

/// An audit log entry from the database, with its unique ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteAuditLog {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub entry: VoteAuditLogCore,
}

impl VoteAuditLog {
    pub fn new(
        vote_id: Id,
        action: AuditAction,
        performed_by: Option<Id>,
        details: String,
        ip_address: Option<String>,
    ) -> Self {
        Self {
            id: Id::new(),
            entry: VoteAuditLogCore {
                vote_id,
                action,
                performed_by,
                details,
                ip_address,
                created_at: Utc::now(),
            },
        }
    }
}

impl Deref for VoteAuditLog {
    type Target = VoteAuditLogCore;

    fn deref(&self) -> &Self::Target {
        &self.entry
    }
}
