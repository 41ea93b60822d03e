use serde::{Deserialize, Serialize};

use crate::model::{
    api::{auth::Principal, id::ApiId},
    common::role::Role,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Complete registration through an invitation token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub token: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

/// Create a staff or admin account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewStaffRequest {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
    pub role: Role,
}

/// The caller as seen by the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserDescription {
    pub id: ApiId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub election_event_id: Option<ApiId>,
    pub capabilities: Vec<String>,
}

impl From<&Principal> for UserDescription {
    fn from(principal: &Principal) -> Self {
        Self {
            id: principal.user.id.into(),
            email: principal.user.email.clone(),
            first_name: principal.user.first_name.clone(),
            last_name: principal.user.last_name.clone(),
            role: principal.user.role,
            election_event_id: principal
                .voter_profile
                .as_ref()
                .map(|p| p.election_event_id.into()),
            capabilities: principal
                .capabilities()
                .into_iter()
                .map(|c| format!("{c:?}"))
                .collect(),
        }
    }
}

#[cfg(test)]
pub mod examples {
    use super::*;

    use crate::model::db::user::{examples::EXAMPLE_PASSWORD, DEFAULT_ADMIN_EMAIL};

    impl LoginRequest {
        pub fn new(email: &str, password: &str) -> Self {
            Self {
                email: email.to_string(),
                password: password.to_string(),
            }
        }

        /// Credentials of the admin created by `#[backend_test(admin)]`.
        pub fn admin_example() -> Self {
            Self::new("coordinator@nexavote.test", EXAMPLE_PASSWORD)
        }

        /// Credentials of the voter created by `#[backend_test(voter)]`.
        pub fn voter_example() -> Self {
            Self::new("voter@nexavote.test", EXAMPLE_PASSWORD)
        }

        pub fn default_admin(password: &str) -> Self {
            Self::new(DEFAULT_ADMIN_EMAIL, password)
        }
    }
}
