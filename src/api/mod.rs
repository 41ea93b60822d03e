use rocket::{
    http::Status,
    serde::json::{json, Json, Value},
    Catcher, Request, Route,
};

use crate::error::status_kind;

pub mod admin;
pub mod auth;
pub mod common;
pub mod results;
pub mod voting;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(admin::routes());
    routes.extend(auth::routes());
    routes.extend(results::routes());
    routes.extend(voting::routes());
    routes
}

pub fn catchers() -> Vec<Catcher> {
    catchers![json_catcher]
}

/// Give failures that never reached a handler (e.g. rejected guards or unmatched
/// routes) the same JSON shape as handler errors.
#[catch(default)]
fn json_catcher(status: Status, _req: &Request) -> (Status, Json<Value>) {
    let message = status.reason().unwrap_or("Unknown error");
    (
        status,
        Json(json!({
            "error": status_kind(status),
            "message": message,
        })),
    )
}

/// Helpers shared by the route tests.
#[cfg(test)]
pub(crate) mod testing {
    use mongodb::Database;
    use rocket::{
        http::{ContentType, Status},
        local::asynchronous::Client,
        serde::json::json,
    };

    use crate::model::{
        api::credentials::LoginRequest,
        db::user::{NewUser, User},
        mongodb::{Coll, Id},
    };

    /// Replace the client's session with one for the given credentials.
    pub async fn log_in_as(client: &Client, credentials: &LoginRequest) {
        let response = client
            .post(uri!(super::auth::login))
            .header(ContentType::JSON)
            .body(json!(credentials).to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);
    }

    /// Insert the example election admin, without logging in.
    pub async fn add_admin(db: &Database) -> User {
        let admin = User {
            id: Id::new(),
            user: NewUser::admin_example(),
        };
        Coll::<User>::from_db(db)
            .insert_one(&admin, None)
            .await
            .unwrap();
        admin
    }
}
