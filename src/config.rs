use aws_config::{BehaviorVersion, SdkConfig};
use aws_credential_types::provider::SharedCredentialsProvider;
use aws_sdk_sns::{
    config::{Credentials, Region},
    Client as SnsClient,
};
use chrono::Duration;
use mongodb::Client as MongoClient;
use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};
use serde::Deserialize;

use crate::model::{
    db::user::ensure_admin_exists,
    mongodb::{ensure_indexes_exist, Coll},
};
use crate::notify::{LogNotifier, Notifier, SnsNotifier};
use crate::throttle::VerifyThrottle;

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Deserialize)]
pub struct Config {
    // non-secrets
    hostname: String,
    frontend_url: String,
    auth_ttl: u32,
    verify_rate_limit: u32,
    verify_rate_window: u32,
    // secrets
    jwt_secret: String,
    default_admin_password: String,
}

impl Config {
    /// The hostname the site is running on.
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// Base URL of the frontend, used to build registration links.
    pub fn frontend_url(&self) -> &str {
        self.frontend_url.trim_end_matches('/')
    }

    /// Valid lifetime of auth token cookies in seconds.
    pub fn auth_ttl(&self) -> Duration {
        Duration::seconds(self.auth_ttl.into())
    }

    /// Secret key used to encrypt JWTs.
    pub fn jwt_secret(&self) -> &[u8] {
        self.jwt_secret.as_bytes()
    }

    /// Password for the admin account created on an empty database.
    pub fn default_admin_password(&self) -> &str {
        &self.default_admin_password
    }

    /// Maximum hash verification requests per client per window.
    pub fn verify_rate_limit(&self) -> u32 {
        self.verify_rate_limit
    }

    /// Length of the hash verification throttle window.
    pub fn verify_rate_window(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.verify_rate_window.into())
    }

    /// The registration link for an invitation token.
    pub fn registration_link(&self, token: &str) -> String {
        format!("{}/register?token={token}", self.frontend_url())
    }
}

/// A fairing that loads the application config and puts it in managed state,
/// along with the verification throttle it parameterises.
pub struct ConfigFairing;

#[rocket::async_trait]
impl Fairing for ConfigFairing {
    fn info(&self) -> Info {
        Info {
            name: "Config",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load application config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        let throttle = VerifyThrottle::new(config.verify_rate_limit(), config.verify_rate_window());

        // Manage the state.
        rocket = rocket.manage(config).manage(throttle);
        Ok(rocket)
    }
}

/// Configuration for the database.
#[derive(Deserialize)]
struct DbConfig {
    // secrets
    db_uri: String,
    default_admin_password: String,
}

/// A fairing that loads the MongoDB config, connects to the database,
/// performs any setup necessary, and places both a `Client` and a `Database`
/// into managed state.
pub struct DatabaseFairing;

#[rocket::async_trait]
impl Fairing for DatabaseFairing {
    fn info(&self) -> Info {
        Info {
            name: "MongoDB",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<DbConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load database config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        info!("Loaded database config, connecting...");
        // Construct the connection.
        let client = match MongoClient::with_uri_str(config.db_uri).await {
            Ok(client) => client,
            Err(e) => {
                error!("Failed to connect to database: {e}");
                return Err(rocket);
            }
        };
        let db = client.database(&get_database_name());

        // Ensure the required indexes exist.
        if let Err(e) = ensure_indexes_exist(&db).await {
            error!("Failed to create database indexes: {e}");
            return Err(rocket);
        }

        // Ensure there is at least one superuser.
        if let Err(e) = ensure_admin_exists(&Coll::from_db(&db), &config.default_admin_password).await
        {
            error!("Failed to create default admin: {e}");
            return Err(rocket);
        }
        info!("...database connection online!");

        // Manage the state.
        rocket = rocket.manage(client).manage(db);
        Ok(rocket)
    }
}

/// Get the name of the database to use (production version).
#[cfg(not(test))]
fn get_database_name() -> String {
    "nexavote".to_string()
}

/// Get the name of the database to use (test version).
/// Use a random name to avoid collisions between tests.
#[cfg(test)]
fn get_database_name() -> String {
    let random: u32 = rand::random();
    let db = format!("test{random}");
    info!("Using database {db}");
    db
}

/// Configuration for the AWS connection. Every field is optional: without a
/// topic, notifications are only logged.
#[derive(Deserialize)]
struct NotifierConfig {
    // non-secrets
    aws_region: Option<String>,
    aws_access_key_id: Option<String>,
    notification_topic_arn: Option<String>,
    // secrets
    aws_secret_access_key: Option<String>,
}

/// A fairing that loads the notification config and places a `Box<dyn Notifier>`
/// into managed state.
pub struct NotifierFairing;

#[rocket::async_trait]
impl Fairing for NotifierFairing {
    fn info(&self) -> Info {
        Info {
            name: "Notifier",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        // Load the config.
        let config = match rocket.figment().extract::<NotifierConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load notifier config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };

        let notifier: Box<dyn Notifier> = match config {
            NotifierConfig {
                aws_region: Some(region),
                aws_access_key_id: Some(key_id),
                aws_secret_access_key: Some(secret),
                notification_topic_arn: Some(topic_arn),
            } => {
                // Construct the connection.
                let aws_config = SdkConfig::builder()
                    .region(Region::new(region))
                    .credentials_provider(SharedCredentialsProvider::new(Credentials::new(
                        key_id,
                        secret,
                        None,
                        None,
                        "rocket config",
                    )))
                    .behavior_version(BehaviorVersion::latest())
                    .build();
                info!("Loaded Amazon SNS config");
                Box::new(SnsNotifier::new(SnsClient::new(&aws_config), topic_arn))
            }
            _ => {
                warn!("Amazon SNS not configured, notifications will only be logged");
                Box::new(LogNotifier)
            }
        };

        // Manage the state.
        rocket = rocket.manage(notifier);
        Ok(rocket)
    }
}
