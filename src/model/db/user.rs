use std::ops::{Deref, DerefMut};

use argon2::Config as Argon2Config;
use mongodb::bson::doc;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{
    common::role::{Role, ELECTION_ADMINS_GROUP},
    mongodb::{Coll, Id},
};

pub const MIN_PASSWORD_LENGTH: usize = 8;
pub const DEFAULT_ADMIN_EMAIL: &str = "admin@nexavote.local";

/// Core user account data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCore {
    /// Login identifier, always lowercase.
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub is_staff: bool,
    #[serde(default)]
    pub is_superuser: bool,
    /// Names of permission groups this user belongs to.
    #[serde(default)]
    pub groups: Vec<String>,
}

impl UserCore {
    /// Create a new user with a freshly hashed password.
    pub fn new(
        email: &str,
        first_name: String,
        last_name: String,
        password: &str,
        role: Role,
    ) -> Result<Self> {
        Ok(Self {
            email: normalize_email(email),
            first_name,
            last_name,
            password_hash: hash_password(password)?,
            role,
            is_staff: role == Role::Staff,
            is_superuser: false,
            groups: Vec::new(),
        })
    }

    /// Check whether the given password is correct.
    pub fn verify_password<T: AsRef<[u8]>>(&self, password: T) -> bool {
        argon2::verify_encoded(&self.password_hash, password.as_ref()).unwrap_or(false)
    }

    /// Is this user a member of the named group?
    pub fn in_group(&self, group: &str) -> bool {
        self.groups.iter().any(|g| g == group)
    }

    /// Does this account carry any of the flags that make it an election administrator?
    pub fn is_election_admin(&self) -> bool {
        self.is_staff
            || self.is_superuser
            || self.role == Role::Admin
            || self.in_group(ELECTION_ADMINS_GROUP)
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// A user without an ID.
pub type NewUser = UserCore;

/// A user from the database, with its unique ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub user: UserCore,
}

impl Deref for User {
    type Target = UserCore;

    fn deref(&self) -> &Self::Target {
        &self.user
    }
}

impl DerefMut for User {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.user
    }
}

/// Emails are compared case-insensitively by storing them lowercased and trimmed.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Hash a password with Argon2 and a random salt.
pub fn hash_password(password: &str) -> Result<String> {
    // 16 bytes is the recommended salt length for Argon2.
    let mut salt = [0_u8; 16];
    rand::thread_rng().fill(&mut salt);
    Ok(argon2::hash_encoded(
        password.as_bytes(),
        &salt,
        &Argon2Config::default(),
    )?)
}

/// Ensure at least one superuser exists, creating the default one if not.
///
/// This operation is idempotent.
pub async fn ensure_admin_exists(users: &Coll<NewUser>, default_password: &str) -> Result<()> {
    let superuser = doc! { "is_superuser": true };
    if users.count_documents(superuser, None).await? > 0 {
        return Ok(());
    }

    warn!("No superuser found, creating default admin {DEFAULT_ADMIN_EMAIL}");
    let mut admin = NewUser::new(
        DEFAULT_ADMIN_EMAIL,
        "Default".to_string(),
        "Admin".to_string(),
        default_password,
        Role::Admin,
    )?;
    admin.is_superuser = true;
    users.insert_one(admin, None).await?;
    Ok(())
}

/// Example data for tests.
#[cfg(test)]
pub mod examples {
    use super::*;

    pub const EXAMPLE_PASSWORD: &str = "correct-horse-battery";

    impl UserCore {
        pub fn admin_example() -> Self {
            Self::new(
                "coordinator@nexavote.test",
                "Ada".to_string(),
                "Coordinator".to_string(),
                EXAMPLE_PASSWORD,
                Role::Admin,
            )
            .unwrap()
        }

        pub fn voter_example() -> Self {
            Self::voter_example_with_email("voter@nexavote.test")
        }

        pub fn voter_example_with_email(email: &str) -> Self {
            Self::new(
                email,
                "Victor".to_string(),
                "Voter".to_string(),
                EXAMPLE_PASSWORD,
                Role::Voter,
            )
            .unwrap()
        }
    }
}
