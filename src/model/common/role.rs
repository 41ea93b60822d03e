use mongodb::bson::Bson;
use serde::{Deserialize, Serialize};

/// Name of the group whose members hold the election-admin capability.
pub const ELECTION_ADMINS_GROUP: &str = "ElectionAdmins";

/// The role stored on a user account.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Voter,
    Staff,
    Admin,
}

impl Default for Role {
    fn default() -> Self {
        Self::Voter
    }
}

impl From<Role> for Bson {
    fn from(role: Role) -> Self {
        let name = match role {
            Role::Voter => "voter",
            Role::Staff => "staff",
            Role::Admin => "admin",
        };
        Bson::String(name.to_string())
    }
}
