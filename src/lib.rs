#[macro_use]
extern crate rocket;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use rocket::{Build, Rocket};

pub mod api;
pub mod config;
pub mod error;
pub mod ledger;
pub mod logging;
pub mod model;
pub mod notify;
pub mod throttle;

use config::{ConfigFairing, DatabaseFairing, NotifierFairing};
use logging::LoggerFairing;

/// Build the server with every fairing attached.
pub fn build() -> Rocket<Build> {
    rocket::build()
        .mount("/", api::routes())
        .register("/", api::catchers())
        .attach(LoggerFairing)
        .attach(ConfigFairing)
        .attach(DatabaseFairing)
        .attach(NotifierFairing)
}

/// Connect to the database named in the test config.
#[cfg(test)]
pub(crate) async fn db_client() -> mongodb::Client {
    let db_uri = rocket::Config::figment()
        .extract_inner::<String>("db_uri")
        .unwrap();
    mongodb::Client::with_uri_str(db_uri).await.unwrap()
}

/// A fresh database name, so concurrently running tests never collide.
#[cfg(test)]
pub(crate) fn database() -> String {
    format!("test{}", rand::random::<u32>())
}

/// Build a server for tests, using an existing connection and a logging notifier.
#[cfg(test)]
pub(crate) async fn rocket_for_db(db_client: mongodb::Client, db_name: &str) -> Rocket<Build> {
    use model::{
        db::user::ensure_admin_exists,
        mongodb::{ensure_indexes_exist, Coll},
    };
    use notify::{LogNotifier, Notifier};

    // Tests enter backend code, so enable logging.
    log4rs_test_utils::test_logging::init_logging_once_for(["nexavote_backend"], None, None);

    let db = db_client.database(db_name);
    ensure_indexes_exist(&db).await.unwrap();
    let rocket = rocket::build()
        .mount("/", api::routes())
        .register("/", api::catchers())
        .attach(LoggerFairing)
        .attach(ConfigFairing);
    let password = rocket
        .figment()
        .extract_inner::<String>("default_admin_password")
        .unwrap();
    ensure_admin_exists(&Coll::from_db(&db), &password).await.unwrap();

    let notifier: Box<dyn Notifier> = Box::new(LogNotifier);
    rocket.manage(db_client).manage(db).manage(notifier)
}
