use mongodb::{bson::doc, error::Error as DbError, Client};
use rocket::{
    http::{Cookie, CookieJar, Status},
    serde::json::Json,
    Route, State,
};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::{
    api::{
        auth::{AuthToken, Principal, AUTH_TOKEN_COOKIE},
        credentials::{LoginRequest, RegisterRequest, UserDescription},
    },
    common::role::Role,
    db::{
        invitation::Invitation,
        user::{normalize_email, NewUser, User, MIN_PASSWORD_LENGTH},
        voter_profile::{NewVoterProfile, VoterProfile},
    },
    mongodb::{
        errors::{is_duplicate_key_error, is_write_conflict_error},
        Coll, Id,
    },
};

pub fn routes() -> Vec<Route> {
    routes![login, logout, register, me]
}

#[post("/auth/login", data = "<credentials>", format = "json")]
pub async fn login(
    credentials: Json<LoginRequest>,
    cookies: &CookieJar<'_>,
    users: Coll<User>,
    config: &State<Config>,
) -> Result<()> {
    let with_email = doc! { "email": normalize_email(&credentials.email) };
    let user = users
        .find_one(with_email, None)
        .await?
        .filter(|user| user.verify_password(&credentials.password))
        .ok_or_else(|| {
            Error::Status(
                Status::Unauthorized,
                "No user found with the provided email and password combination.".to_string(),
            )
        })?;

    let token = AuthToken::new(&user);
    cookies.add(token.into_cookie(config)?);
    info!("User {} logged in", user.id);

    Ok(())
}

#[delete("/auth")]
pub fn logout(cookies: &CookieJar) -> Status {
    cookies.remove(Cookie::named(AUTH_TOKEN_COOKIE));
    Status::Ok
}

/// Complete registration through an invitation, becoming a voter of its event.
#[post("/auth/register", data = "<request>", format = "json")]
pub async fn register(
    request: Json<RegisterRequest>,
    cookies: &CookieJar<'_>,
    invitations: Coll<Invitation>,
    users: Coll<User>,
    profiles: Coll<VoterProfile>,
    db_client: &State<Client>,
    config: &State<Config>,
) -> Result<Json<UserDescription>> {
    let request = request.into_inner();
    if request.password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(Error::bad_request(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }

    let (user, profile) = {
        let mut session = db_client.start_session(None).await?;
        session.start_transaction(None).await?;

        let unused = doc! { "token": request.token.trim(), "is_used": false };
        let invitation = invitations
            .find_one_with_session(unused, None, &mut session)
            .await?
            .ok_or_else(|| Error::bad_request("Invalid or already used invitation token"))?;

        // Reuse an existing account (e.g. staff) as long as it is not already a voter.
        let with_email = doc! { "email": &invitation.email };
        let user = match users
            .find_one_with_session(with_email, None, &mut session)
            .await?
        {
            Some(user) => {
                let has_profile = profiles
                    .find_one_with_session(doc! { "user_id": user.id }, None, &mut session)
                    .await?
                    .is_some();
                if has_profile {
                    return Err(Error::bad_request("This account is already registered as a voter"));
                }
                user
            }
            None => {
                let user = User {
                    id: Id::new(),
                    user: NewUser::new(
                        &invitation.email,
                        request.first_name,
                        request.last_name,
                        &request.password,
                        Role::Voter,
                    )?,
                };
                users
                    .insert_one_with_session(&user, None, &mut session)
                    .await
                    .map_err(registration_error)?;
                user
            }
        };

        let profile = VoterProfile {
            id: Id::new(),
            profile: NewVoterProfile {
                user_id: user.id,
                election_event_id: invitation.election_event_id,
            },
        };
        profiles
            .insert_one_with_session(&profile, None, &mut session)
            .await
            .map_err(registration_error)?;

        // Conditional on still being unused, so one token can never register twice.
        let consume = doc! { "$set": { "is_used": true } };
        let result = invitations
            .update_one_with_session(
                doc! { "_id": invitation.id, "is_used": false },
                consume,
                None,
                &mut session,
            )
            .await
            .map_err(registration_error)?;
        if result.modified_count != 1 {
            return Err(Error::bad_request("Invitation has already been used"));
        }

        session
            .commit_transaction()
            .await
            .map_err(registration_error)?;
        (user, profile)
    };

    info!(
        "User {} registered as voter for election event {}",
        user.id, profile.election_event_id
    );
    cookies.add(AuthToken::new(&user).into_cookie(config)?);

    let principal = Principal {
        user,
        voter_profile: Some(profile),
    };
    Ok(Json(UserDescription::from(&principal)))
}

#[get("/auth/me")]
pub async fn me(principal: Principal) -> Json<UserDescription> {
    Json(UserDescription::from(&principal))
}

/// Concurrent registrations collide on unique indexes; report them as a used invitation.
fn registration_error(err: DbError) -> Error {
    if is_duplicate_key_error(&err) || is_write_conflict_error(&err) {
        Error::bad_request("Invitation has already been used")
    } else {
        Error::Db(err)
    }
}

#[cfg(test)]
mod tests {
    use mongodb::Database;
    use rocket::{
        http::{ContentType, Status},
        local::asynchronous::Client,
        serde::json::{json, serde_json},
    };

    use crate::model::{
        db::{
            election_event::NewElectionEvent,
            invitation::NewInvitation,
            user::DEFAULT_ADMIN_EMAIL,
        },
        mongodb::Coll,
    };

    use super::*;

    async fn login_as(client: &Client, credentials: &LoginRequest) -> Status {
        client
            .post(uri!(login))
            .header(ContentType::JSON)
            .body(json!(credentials).to_string())
            .dispatch()
            .await
            .status()
    }

    #[backend_test]
    async fn default_admin_created_and_can_log_in(client: Client, users: Coll<User>) {
        let admin = users
            .find_one(doc! { "email": DEFAULT_ADMIN_EMAIL }, None)
            .await
            .unwrap()
            .unwrap();
        assert!(admin.is_superuser);

        let password = client
            .rocket()
            .state::<Config>()
            .unwrap()
            .default_admin_password()
            .to_string();
        let status = login_as(&client, &LoginRequest::default_admin(&password)).await;
        assert_eq!(status, Status::Ok);
        assert!(client.cookies().get(AUTH_TOKEN_COOKIE).is_some());
    }

    #[backend_test]
    async fn wrong_password_rejected(client: Client) {
        let status = login_as(&client, &LoginRequest::default_admin("not the password")).await;
        assert_eq!(status, Status::Unauthorized);
        assert!(client.cookies().get(AUTH_TOKEN_COOKIE).is_none());
    }

    #[backend_test(voter)]
    async fn me_reports_capabilities(client: Client) {
        let response = client.get(uri!(me)).dispatch().await;
        assert_eq!(response.status(), Status::Ok);
        let me: UserDescription =
            serde_json::from_str(&response.into_string().await.unwrap()).unwrap();
        assert_eq!(me.capabilities, vec!["Voter".to_string()]);
        assert!(me.election_event_id.is_some());

        client.delete(uri!(logout)).dispatch().await;
        let response = client.get(uri!(me)).dispatch().await;
        assert_eq!(response.status(), Status::Unauthorized);
    }

    #[backend_test]
    async fn register_consumes_invitation_once(client: Client, db: Database) {
        let event_id = Coll::<NewElectionEvent>::from_db(&db)
            .insert_one(NewElectionEvent::current_example(), None)
            .await
            .unwrap()
            .inserted_id
            .as_object_id()
            .unwrap();
        let invitation = NewInvitation::new(
            "new.voter@nexavote.test",
            "New".to_string(),
            "Voter".to_string(),
            event_id.into(),
            None,
        );
        Coll::<NewInvitation>::from_db(&db)
            .insert_one(&invitation, None)
            .await
            .unwrap();

        let request = json!({
            "token": invitation.token,
            "first_name": "New",
            "last_name": "Voter",
            "password": "long enough password",
        });
        let response = client
            .post(uri!(register))
            .header(ContentType::JSON)
            .body(request.to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::Ok);

        let stored = Coll::<Invitation>::from_db(&db)
            .find_one(doc! { "token": &invitation.token }, None)
            .await
            .unwrap()
            .unwrap();
        assert!(stored.is_used);
        let profile = Coll::<VoterProfile>::from_db(&db)
            .find_one(doc! { "election_event_id": event_id }, None)
            .await
            .unwrap();
        assert!(profile.is_some());

        // The token is spent.
        let response = client
            .post(uri!(register))
            .header(ContentType::JSON)
            .body(request.to_string())
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::BadRequest);
    }

    #[backend_test]
    async fn register_rejects_short_password(client: Client) {
        let response = client
            .post(uri!(register))
            .header(ContentType::JSON)
            .body(
                json!({
                    "token": "whatever",
                    "first_name": "A",
                    "last_name": "B",
                    "password": "short",
                })
                .to_string(),
            )
            .dispatch()
            .await;
        assert_eq!(response.status(), Status::BadRequest);
    }
}
