use std::fmt::{Display, Formatter};

use mongodb::bson::Bson;
use rocket::form::FromFormField;
use serde::{Deserialize, Serialize};

/// Kinds of vote audit log entries.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, FromFormField)]
#[serde(rename_all = "lowercase")]
pub enum AuditAction {
    #[field(value = "cast")]
    Cast,
    #[field(value = "modified")]
    Modified,
    #[field(value = "verified")]
    Verified,
    #[field(value = "flagged")]
    Flagged,
}

impl AuditAction {
    /// The moderation action that corresponds to setting `is_verified` to the given value.
    pub fn for_verification(is_verified: bool) -> Self {
        if is_verified {
            Self::Verified
        } else {
            Self::Flagged
        }
    }
}

impl Display for AuditAction {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Cast => "cast",
            Self::Modified => "modified",
            Self::Verified => "verified",
            Self::Flagged => "flagged",
        };
        write!(f, "{name}")
    }
}

impl From<AuditAction> for Bson {
    fn from(action: AuditAction) -> Self {
        Bson::String(action.to_string())
    }
}
