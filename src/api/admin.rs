use mongodb::{
    bson::{doc, Document},
    Client, ClientSession, Database,
};
use rocket::{futures::TryStreamExt, http::Status, serde::json::Json, Route, State};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::ledger;
use crate::model::{
    api::{
        auth::AdminPrincipal,
        client::ClientAddress,
        credentials::NewStaffRequest,
        election::{
            ActiveToggle, CandidateDescription, CandidateSpec, ElectionDescription, ElectionSpec,
            ElectionUpdate, EventDescription, EventSpec,
        },
        id::ApiId,
        invitation::{InvitationDescription, InvitationReport, InvitationRequest},
        vote::{VerificationUpdate, VoteDetail},
    },
    common::role::Role,
    db::{
        audit_log::VoteAuditLog,
        candidate::{Candidate, NewCandidate},
        election::{Election, NewElection},
        election_event::{ElectionEvent, NewElectionEvent},
        invitation::{Invitation, NewInvitation},
        user::{NewUser, User, MIN_PASSWORD_LENGTH},
        vote::Vote,
        voter_profile::VoterProfile,
    },
    mongodb::{errors::is_duplicate_key_error, Coll, Id, MongoCollection},
};
use crate::notify::{InvitationEvent, Notifier};

use super::common::{candidate_by_id, election_by_id, event_by_id, vote_detail};

pub fn routes() -> Vec<Route> {
    routes![
        create_user,
        create_event,
        get_events,
        get_event,
        toggle_event,
        delete_event,
        create_election,
        modify_election,
        toggle_election,
        delete_election,
        create_candidate,
        modify_candidate,
        delete_candidate,
        create_invitations,
        get_invitations,
        set_vote_verification,
    ]
}

#[post("/admin/users", data = "<request>", format = "json")]
async fn create_user(
    _admin: AdminPrincipal,
    request: Json<NewStaffRequest>,
    users: Coll<NewUser>,
) -> Result<Json<ApiId>> {
    let request = request.into_inner();
    if request.role == Role::Voter {
        return Err(Error::bad_request(
            "Voters register through invitations; role must be staff or admin",
        ));
    }
    if request.password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(Error::bad_request(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }

    let user = NewUser::new(
        &request.email,
        request.first_name,
        request.last_name,
        &request.password,
        request.role,
    )?;
    let email = user.email.clone();
    let inserted = users.insert_one(user, None).await.map_err(|e| {
        if is_duplicate_key_error(&e) {
            Error::bad_request(format!("Email already in use: {email}"))
        } else {
            e.into()
        }
    })?;
    let id: Id = inserted
        .inserted_id
        .as_object_id()
        .ok_or_else(|| Error::Status(Status::InternalServerError, "Bad inserted ID".to_string()))?
        .into();

    info!("Created {:?} account {id}", request.role);
    Ok(Json(id.into()))
}

#[post("/events", data = "<spec>", format = "json")]
async fn create_event(
    _admin: AdminPrincipal,
    spec: Json<EventSpec>,
    events: Coll<ElectionEvent>,
) -> Result<Json<EventDescription>> {
    let event = ElectionEvent {
        id: Id::new(),
        event: NewElectionEvent::try_from(spec.into_inner())?,
    };
    events.insert_one(&event, None).await?;
    info!("Created election event {}", event.id);
    Ok(Json(event.into()))
}

#[get("/events")]
async fn get_events(
    _admin: AdminPrincipal,
    events: Coll<ElectionEvent>,
) -> Result<Json<Vec<EventDescription>>> {
    let events: Vec<ElectionEvent> = events.find(None, None).await?.try_collect().await?;
    Ok(Json(events.into_iter().map(Into::into).collect()))
}

#[get("/events/<event_id>")]
async fn get_event(
    _admin: AdminPrincipal,
    event_id: Id,
    events: Coll<ElectionEvent>,
) -> Result<Json<EventDescription>> {
    Ok(Json(event_by_id(event_id, &events).await?.into()))
}

/// Deactivating an event closes every one of its elections immediately.
#[put("/events/<event_id>/active", data = "<toggle>", format = "json")]
async fn toggle_event(
    _admin: AdminPrincipal,
    event_id: Id,
    toggle: Json<ActiveToggle>,
    events: Coll<ElectionEvent>,
) -> Result<Json<EventDescription>> {
    let update = doc! { "$set": { "is_active": toggle.is_active } };
    let result = events.update_one(event_id.as_doc(), update, None).await?;
    if result.matched_count == 0 {
        return Err(Error::not_found(format!("Election event with ID '{event_id}'")));
    }
    info!("Election event {event_id} is_active set to {}", toggle.is_active);
    Ok(Json(event_by_id(event_id, &events).await?.into()))
}

#[delete("/events/<event_id>")]
async fn delete_event(
    _admin: AdminPrincipal,
    event_id: Id,
    db_client: &State<Client>,
    db: &State<Database>,
) -> Result<()> {
    let mut session = db_client.start_session(None).await?;
    session.start_transaction(None).await?;

    let deleted = Coll::<ElectionEvent>::from_db(db)
        .delete_one_with_session(event_id.as_doc(), None, &mut session)
        .await?;
    if deleted.deleted_count == 0 {
        return Err(Error::not_found(format!("Election event with ID '{event_id}'")));
    }

    let of_event = doc! { "election_event_id": event_id };
    let election_ids = ids_matching::<Election>(db, &mut session, of_event.clone()).await?;
    delete_elections(db, &mut session, election_ids).await?;
    Coll::<Invitation>::from_db(db)
        .delete_many_with_session(of_event.clone(), None, &mut session)
        .await?;
    Coll::<VoterProfile>::from_db(db)
        .delete_many_with_session(of_event, None, &mut session)
        .await?;

    session.commit_transaction().await?;
    warn!("Deleted election event {event_id} and everything in it");
    Ok(())
}

#[post("/events/<event_id>/elections", data = "<spec>", format = "json")]
async fn create_election(
    _admin: AdminPrincipal,
    event_id: Id,
    spec: Json<ElectionSpec>,
    events: Coll<ElectionEvent>,
    elections: Coll<Election>,
) -> Result<Json<ElectionDescription>> {
    let event = event_by_id(event_id, &events).await?;
    let spec = spec.into_inner();
    let election = Election {
        id: Id::new(),
        election: NewElection::new(
            &event,
            spec.title,
            spec.description,
            spec.start_time,
            spec.end_time,
            spec.is_active,
        )?,
    };
    elections.insert_one(&election, None).await?;
    info!("Created election {} in event {event_id}", election.id);
    Ok(Json(election.into()))
}

/// Update an election's details. The window must still nest inside the event's.
#[put("/elections/<election_id>", data = "<update>", format = "json")]
async fn modify_election(
    _admin: AdminPrincipal,
    election_id: Id,
    update: Json<ElectionUpdate>,
    events: Coll<ElectionEvent>,
    elections: Coll<Election>,
) -> Result<Json<ElectionDescription>> {
    let mut election = election_by_id(election_id, &elections).await?;
    let event = event_by_id(election.election_event_id, &events).await?;

    let update = update.into_inner();
    if let Some(title) = update.title {
        election.title = title;
    }
    if let Some(description) = update.description {
        election.description = description;
    }
    if let Some(start_time) = update.start_time {
        election.start_time = start_time;
    }
    if let Some(end_time) = update.end_time {
        election.end_time = end_time;
    }
    election.validate(&event)?;

    elections
        .replace_one(election_id.as_doc(), &election, None)
        .await?;
    Ok(Json(election.into()))
}

#[put("/elections/<election_id>/active", data = "<toggle>", format = "json")]
async fn toggle_election(
    _admin: AdminPrincipal,
    election_id: Id,
    toggle: Json<ActiveToggle>,
    elections: Coll<Election>,
) -> Result<Json<ElectionDescription>> {
    let update = doc! { "$set": { "is_active": toggle.is_active } };
    let result = elections.update_one(election_id.as_doc(), update, None).await?;
    if result.matched_count == 0 {
        return Err(Error::not_found(format!("Election with ID '{election_id}'")));
    }
    info!("Election {election_id} is_active set to {}", toggle.is_active);
    Ok(Json(election_by_id(election_id, &elections).await?.into()))
}

#[delete("/elections/<election_id>")]
async fn delete_election(
    _admin: AdminPrincipal,
    election_id: Id,
    db_client: &State<Client>,
    db: &State<Database>,
) -> Result<()> {
    let mut session = db_client.start_session(None).await?;
    session.start_transaction(None).await?;

    let exists = Coll::<Election>::from_db(db)
        .count_documents_with_session(election_id.as_doc(), None, &mut session)
        .await?;
    if exists == 0 {
        return Err(Error::not_found(format!("Election with ID '{election_id}'")));
    }
    delete_elections(db, &mut session, vec![election_id]).await?;

    session.commit_transaction().await?;
    warn!("Deleted election {election_id}");
    Ok(())
}

#[post("/elections/<election_id>/candidates", data = "<spec>", format = "json")]
async fn create_candidate(
    _admin: AdminPrincipal,
    election_id: Id,
    spec: Json<CandidateSpec>,
    elections: Coll<Election>,
    candidates: Coll<Candidate>,
    users: Coll<User>,
) -> Result<Json<CandidateDescription>> {
    let election = election_by_id(election_id, &elections).await?;
    let candidate = Candidate {
        id: Id::new(),
        candidate: spec.into_inner().into_candidate(&election)?,
    };
    check_candidate_user(&candidate, &candidates, &users).await?;

    candidates
        .insert_one(&candidate, None)
        .await
        .map_err(candidate_write_error)?;
    info!("Created candidate {} in election {election_id}", candidate.id);
    Ok(Json(candidate.into()))
}

#[put("/candidates/<candidate_id>", data = "<spec>", format = "json")]
async fn modify_candidate(
    _admin: AdminPrincipal,
    candidate_id: Id,
    spec: Json<CandidateSpec>,
    elections: Coll<Election>,
    candidates: Coll<Candidate>,
    users: Coll<User>,
) -> Result<Json<CandidateDescription>> {
    let existing = candidate_by_id(candidate_id, &candidates).await?;
    let election = election_by_id(existing.election_id, &elections).await?;
    let candidate = Candidate {
        id: candidate_id,
        candidate: spec.into_inner().into_candidate(&election)?,
    };
    check_candidate_user(&candidate, &candidates, &users).await?;

    candidates
        .replace_one(candidate_id.as_doc(), &candidate, None)
        .await
        .map_err(candidate_write_error)?;
    Ok(Json(candidate.into()))
}

#[delete("/candidates/<candidate_id>")]
async fn delete_candidate(
    _admin: AdminPrincipal,
    candidate_id: Id,
    db_client: &State<Client>,
    db: &State<Database>,
) -> Result<()> {
    let mut session = db_client.start_session(None).await?;
    session.start_transaction(None).await?;

    let exists = Coll::<Candidate>::from_db(db)
        .count_documents_with_session(candidate_id.as_doc(), None, &mut session)
        .await?;
    if exists == 0 {
        return Err(Error::not_found(format!("Candidate with ID '{candidate_id}'")));
    }
    delete_candidates(db, &mut session, vec![candidate_id]).await?;

    session.commit_transaction().await?;
    warn!("Deleted candidate {candidate_id}");
    Ok(())
}

/// Invite a batch of voters to an event. Bad rows are reported, not fatal.
#[post("/events/<event_id>/invitations", data = "<rows>", format = "json")]
async fn create_invitations(
    admin: AdminPrincipal,
    event_id: Id,
    rows: Json<Vec<InvitationRequest>>,
    events: Coll<ElectionEvent>,
    invitations: Coll<NewInvitation>,
    notifier: &State<Box<dyn Notifier>>,
    config: &State<Config>,
) -> Result<Json<InvitationReport>> {
    let event = event_by_id(event_id, &events).await?;
    let rows = rows.into_inner();
    let mut report = InvitationReport::new(rows.len());

    for (i, row) in rows.into_iter().enumerate() {
        let row_num = i + 1;
        if row.email.trim().is_empty() {
            report.failed(row_num, "Email is required");
            continue;
        }
        if row.first_name.trim().is_empty() || row.last_name.trim().is_empty() {
            report.failed(row_num, "First and last name are required");
            continue;
        }

        let invitation = NewInvitation::new(
            &row.email,
            row.first_name,
            row.last_name,
            event.id,
            Some(admin.id()),
        );
        match invitations.insert_one(&invitation, None).await {
            Ok(_) => report.succeeded(),
            Err(e) if is_duplicate_key_error(&e) => {
                report.duplicate(row_num, &invitation.email);
                continue;
            }
            Err(e) => {
                error!("Failed to create invitation for row {row_num}: {e}");
                report.failed(row_num, "Database error");
                continue;
            }
        }

        let notification = InvitationEvent {
            email: invitation.email.clone(),
            first_name: invitation.first_name.clone(),
            event_title: event.title.clone(),
            registration_link: config.registration_link(&invitation.token),
        };
        if let Err(e) = notifier.invitation_created(&notification).await {
            error!("Invitation for {} created but notification failed: {e}", invitation.email);
        }
    }

    info!(
        "Invitation batch for event {event_id}: {} of {} created",
        report.successful_invitations, report.total_rows
    );
    Ok(Json(report))
}

#[get("/events/<event_id>/invitations")]
async fn get_invitations(
    _admin: AdminPrincipal,
    event_id: Id,
    events: Coll<ElectionEvent>,
    invitations: Coll<Invitation>,
) -> Result<Json<Vec<InvitationDescription>>> {
    event_by_id(event_id, &events).await?;
    let invitations: Vec<Invitation> = invitations
        .find(doc! { "election_event_id": event_id }, None)
        .await?
        .try_collect()
        .await?;
    Ok(Json(invitations.into_iter().map(Into::into).collect()))
}

#[allow(clippy::too_many_arguments)]
#[put("/votes/<vote_id>/verification", data = "<update>", format = "json")]
async fn set_vote_verification(
    admin: AdminPrincipal,
    vote_id: Id,
    update: Json<VerificationUpdate>,
    address: ClientAddress,
    db_client: &State<Client>,
    db: &State<Database>,
    profiles: Coll<VoterProfile>,
    users: Coll<User>,
    candidates: Coll<Candidate>,
    elections: Coll<Election>,
) -> Result<Json<VoteDetail>> {
    let update = update.into_inner();
    let vote = ledger::set_verification(
        db_client,
        db,
        vote_id,
        update.is_verified,
        update.details,
        admin.id(),
        address,
    )
    .await?;
    Ok(Json(
        vote_detail(vote, &profiles, &users, &candidates, &elections).await?,
    ))
}

/// A linked user may stand at most once per election; updating in place is fine.
async fn check_candidate_user(
    candidate: &Candidate,
    candidates: &Coll<Candidate>,
    users: &Coll<User>,
) -> Result<()> {
    let Some(user_id) = candidate.user_id else {
        return Ok(());
    };
    if users.find_one(user_id.as_doc(), None).await?.is_none() {
        return Err(Error::bad_request(format!("No user with ID {user_id}")));
    }
    let clash = doc! {
        "user_id": user_id,
        "election_id": candidate.election_id,
        "_id": { "$ne": candidate.id },
    };
    if candidates.count_documents(clash, None).await? > 0 {
        return Err(Error::bad_request(
            "This user is already a candidate in this election",
        ));
    }
    Ok(())
}

fn candidate_write_error(err: mongodb::error::Error) -> Error {
    if is_duplicate_key_error(&err) {
        Error::bad_request("This user is already a candidate in this election")
    } else {
        err.into()
    }
}

/// The IDs of all documents matching a filter.
async fn ids_matching<T: MongoCollection>(
    db: &Database,
    session: &mut ClientSession,
    filter: Document,
) -> Result<Vec<Id>> {
    let coll = db.collection::<Document>(T::NAME);
    let mut cursor = coll.find_with_session(filter, None, session).await?;
    let docs: Vec<Document> = cursor.stream(session).try_collect().await?;
    Ok(docs
        .iter()
        .filter_map(|d| d.get_object_id("_id").ok())
        .map(Id::from)
        .collect())
}

/// Delete elections along with their candidates, votes and audit logs.
async fn delete_elections(
    db: &Database,
    session: &mut ClientSession,
    election_ids: Vec<Id>,
) -> Result<()> {
    let in_elections = doc! { "election_id": { "$in": election_ids.clone() } };
    let candidate_ids = ids_matching::<Candidate>(db, session, in_elections).await?;
    delete_candidates(db, session, candidate_ids).await?;
    Coll::<Election>::from_db(db)
        .delete_many_with_session(doc! { "_id": { "$in": election_ids } }, None, session)
        .await?;
    Ok(())
}

/// Delete candidates along with their votes and those votes' audit logs.
async fn delete_candidates(
    db: &Database,
    session: &mut ClientSession,
    candidate_ids: Vec<Id>,
) -> Result<()> {
    let for_candidates = doc! { "candidate_id": { "$in": candidate_ids.clone() } };
    let vote_ids = ids_matching::<Vote>(db, session, for_candidates.clone()).await?;
    Coll::<VoteAuditLog>::from_db(db)
        .delete_many_with_session(doc! { "vote_id": { "$in": vote_ids } }, None, session)
        .await?;
    Coll::<Vote>::from_db(db)
        .delete_many_with_session(for_candidates, None, session)
        .await?;
    Coll::<NewCandidate>::from_db(db)
        .delete_many_with_session(doc! { "_id": { "$in": candidate_ids } }, None, session)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use rocket::{
        http::ContentType,
        local::asynchronous::{Client, LocalResponse},
        serde::json::{json, Value},
    };

    use crate::api::testing::log_in_as;
    use crate::ledger::fixtures::{add_election, add_voter};
    use crate::model::{
        api::credentials::LoginRequest,
        common::{audit::AuditAction, window::ElectionState},
        db::{election_event::examples::now_millis, user::examples::EXAMPLE_PASSWORD},
    };

    use super::*;

    async fn post_json<'c>(client: &'c Client, uri: String, body: Value) -> LocalResponse<'c> {
        client
            .post(uri)
            .header(ContentType::JSON)
            .body(body.to_string())
            .dispatch()
            .await
    }

    async fn put_json<'c>(client: &'c Client, uri: String, body: Value) -> LocalResponse<'c> {
        client
            .put(uri)
            .header(ContentType::JSON)
            .body(body.to_string())
            .dispatch()
            .await
    }

    async fn create_current_event(client: &Client) -> EventDescription {
        // Millisecond precision, as stored.
        let now = now_millis();
        let response = post_json(
            client,
            "/events".to_string(),
            json!({
                "title": "Faculty Board",
                "start_time": now - Duration::hours(1),
                "end_time": now + Duration::days(2),
            }),
        )
        .await;
        assert_eq!(response.status(), Status::Ok);
        response.into_json().await.unwrap()
    }

    #[backend_test(admin)]
    async fn elections_must_nest_inside_their_event(client: Client) {
        let event = create_current_event(&client).await;
        assert_eq!(event.state, ElectionState::Open);

        let response = post_json(
            &client,
            format!("/events/{}/elections", event.id),
            json!({
                "title": "Too Long",
                "end_time": event.end_time + Duration::hours(1),
            }),
        )
        .await;
        assert_eq!(response.status(), Status::BadRequest);

        let response = post_json(
            &client,
            format!("/events/{}/elections", event.id),
            json!({ "title": "Chair" }),
        )
        .await;
        assert_eq!(response.status(), Status::Ok);
        let election: ElectionDescription = response.into_json().await.unwrap();
        assert_eq!(election.start_time, event.start_time);
        assert_eq!(election.end_time, event.end_time);

        // Updates are held to the same rule.
        let response = put_json(
            &client,
            format!("/elections/{}", election.id),
            json!({ "start_time": event.start_time - Duration::minutes(1) }),
        )
        .await;
        assert_eq!(response.status(), Status::BadRequest);

        let response = put_json(
            &client,
            format!("/elections/{}/active", election.id),
            json!({ "is_active": false }),
        )
        .await;
        let toggled: ElectionDescription = response.into_json().await.unwrap();
        assert!(!toggled.is_active);
        assert_eq!(toggled.state, ElectionState::Closed);
    }

    #[backend_test(admin)]
    async fn event_rejects_inverted_window(client: Client) {
        let now = Utc::now();
        let response = post_json(
            &client,
            "/events".to_string(),
            json!({
                "title": "Backwards",
                "start_time": now,
                "end_time": now - Duration::hours(1),
            }),
        )
        .await;
        assert_eq!(response.status(), Status::BadRequest);
    }

    #[backend_test(admin)]
    async fn deleting_an_event_cascades(client: Client, db: Database) {
        let event = ElectionEvent::current_example();
        Coll::<ElectionEvent>::from_db(&db)
            .insert_one(&event, None)
            .await
            .unwrap();
        let (election, candidates) =
            add_election(&db, Election::example_in(&event), &["Alice", "Bob"]).await;
        let (_, profile) = add_voter(&db, event.id, "cascade@nexavote.test", true).await;
        let vote = Vote::new(profile.id, &candidates[0]);
        Coll::<Vote>::from_db(&db)
            .insert_one(&vote, None)
            .await
            .unwrap();
        Coll::<VoteAuditLog>::from_db(&db)
            .insert_one(
                VoteAuditLog::new(vote.id, AuditAction::Cast, None, String::new(), None),
                None,
            )
            .await
            .unwrap();

        let response = client.delete(format!("/events/{}", event.id)).dispatch().await;
        assert_eq!(response.status(), Status::Ok);

        assert!(Coll::<Election>::from_db(&db)
            .find_one(election.id.as_doc(), None)
            .await
            .unwrap()
            .is_none());
        let of_election = doc! { "election_id": election.id };
        assert_eq!(
            Coll::<Candidate>::from_db(&db)
                .count_documents(of_election.clone(), None)
                .await
                .unwrap(),
            0
        );
        assert_eq!(
            Coll::<Vote>::from_db(&db)
                .count_documents(of_election, None)
                .await
                .unwrap(),
            0
        );
        assert_eq!(
            Coll::<VoteAuditLog>::from_db(&db)
                .count_documents(doc! { "vote_id": vote.id }, None)
                .await
                .unwrap(),
            0
        );
        let of_event = doc! { "election_event_id": event.id };
        assert_eq!(
            Coll::<Invitation>::from_db(&db)
                .count_documents(of_event.clone(), None)
                .await
                .unwrap(),
            0
        );
        assert_eq!(
            Coll::<VoterProfile>::from_db(&db)
                .count_documents(of_event, None)
                .await
                .unwrap(),
            0
        );

        let response = client.delete(format!("/events/{}", event.id)).dispatch().await;
        assert_eq!(response.status(), Status::NotFound);
    }

    #[backend_test(admin)]
    async fn invitation_batch_reports_each_row(client: Client) {
        let event = create_current_event(&client).await;
        let rows = json!([
            { "email": "Ann@Example.com", "first_name": "Ann", "last_name": "Lee" },
            { "email": "ann@example.com ", "first_name": "Ann", "last_name": "Lee" },
            { "email": "nameless@example.com" },
            { "first_name": "No", "last_name": "Email" },
            { "email": "ben@example.com", "first_name": "Ben", "last_name": "Ode" },
        ]);
        let response = post_json(&client, format!("/events/{}/invitations", event.id), rows).await;
        assert_eq!(response.status(), Status::Ok);
        let report: InvitationReport = response.into_json().await.unwrap();
        assert_eq!(report.total_rows, 5);
        assert_eq!(report.successful_invitations, 2);
        assert_eq!(report.failed_invitations, 3);
        assert_eq!(report.duplicate_emails, vec!["ann@example.com".to_string()]);
        assert_eq!(report.errors.len(), 3);
        assert!(report.errors[0].starts_with("Row 2:"));

        let listed: Vec<InvitationDescription> = client
            .get(format!("/events/{}/invitations", event.id))
            .dispatch()
            .await
            .into_json()
            .await
            .unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().all(|i| !i.is_used && i.invited_by.is_some()));
    }

    #[backend_test(admin)]
    async fn a_user_stands_once_per_election(client: Client, users: Coll<User>) {
        let event = create_current_event(&client).await;
        let mut election_ids = Vec::new();
        for title in ["Chair", "Secretary"] {
            let election: ElectionDescription = post_json(
                &client,
                format!("/events/{}/elections", event.id),
                json!({ "title": title }),
            )
            .await
            .into_json()
            .await
            .unwrap();
            election_ids.push(election.id);
        }
        let standing = users
            .find_one(doc! { "email": "coordinator@nexavote.test" }, None)
            .await
            .unwrap()
            .unwrap();
        let spec = json!({
            "first_name": "Ada",
            "last_name": "Coordinator",
            "user_id": standing.id.to_string(),
        });

        let uri = format!("/elections/{}/candidates", election_ids[0]);
        let first = post_json(&client, uri.clone(), spec.clone()).await;
        assert_eq!(first.status(), Status::Ok);
        let first: CandidateDescription = first.into_json().await.unwrap();
        assert_eq!(post_json(&client, uri, spec.clone()).await.status(), Status::BadRequest);

        // Editing the same candidate keeps its user.
        let response = put_json(&client, format!("/candidates/{}", first.id), spec.clone()).await;
        assert_eq!(response.status(), Status::Ok);

        let uri = format!("/elections/{}/candidates", election_ids[1]);
        assert_eq!(post_json(&client, uri, spec).await.status(), Status::Ok);

        let dangling = json!({
            "first_name": "Nobody",
            "last_name": "Here",
            "user_id": Id::new().to_string(),
        });
        let uri = format!("/elections/{}/candidates", election_ids[1]);
        assert_eq!(post_json(&client, uri, dangling).await.status(), Status::BadRequest);
    }

    #[backend_test(admin)]
    async fn staff_accounts_created_by_admins(client: Client) {
        let voter = json!({
            "email": "wannabe@nexavote.test",
            "first_name": "Wanna",
            "last_name": "Be",
            "password": EXAMPLE_PASSWORD,
            "role": "voter",
        });
        let response = post_json(&client, "/admin/users".to_string(), voter).await;
        assert_eq!(response.status(), Status::BadRequest);

        let staff = json!({
            "email": "Clerk@NexaVote.test",
            "first_name": "Cal",
            "last_name": "Clerk",
            "password": EXAMPLE_PASSWORD,
            "role": "staff",
        });
        let response = post_json(&client, "/admin/users".to_string(), staff.clone()).await;
        assert_eq!(response.status(), Status::Ok);
        let response = post_json(&client, "/admin/users".to_string(), staff).await;
        assert_eq!(response.status(), Status::BadRequest);

        // Staff hold the ElectionAdmin capability.
        log_in_as(&client, &LoginRequest::new("clerk@nexavote.test", EXAMPLE_PASSWORD)).await;
        let response = client.get("/events").dispatch().await;
        assert_eq!(response.status(), Status::Ok);
    }

    #[backend_test(voter)]
    async fn voters_cannot_administer(client: Client) {
        let response = client.get("/events").dispatch().await;
        assert_eq!(response.status(), Status::Forbidden);

        let now = Utc::now();
        let response = post_json(
            &client,
            "/events".to_string(),
            json!({
                "title": "Coup",
                "start_time": now,
                "end_time": now + Duration::hours(1),
            }),
        )
        .await;
        assert_eq!(response.status(), Status::Forbidden);
    }

    #[backend_test(admin)]
    async fn moderation_flags_and_records(client: Client, db: Database) {
        let event = ElectionEvent::current_example();
        Coll::<ElectionEvent>::from_db(&db)
            .insert_one(&event, None)
            .await
            .unwrap();
        let (_, candidates) = add_election(&db, Election::example_in(&event), &["Alice"]).await;
        let vote = Vote::new(Id::new(), &candidates[0]);
        Coll::<Vote>::from_db(&db)
            .insert_one(&vote, None)
            .await
            .unwrap();

        let response = put_json(
            &client,
            format!("/votes/{}/verification", vote.id),
            json!({ "is_verified": false }),
        )
        .await;
        assert_eq!(response.status(), Status::Ok);
        let detail: VoteDetail = response.into_json().await.unwrap();
        assert!(!detail.is_verified);
        assert_eq!(detail.vote_hash, vote.vote_hash);

        let entry = Coll::<VoteAuditLog>::from_db(&db)
            .find_one(doc! { "vote_id": vote.id }, None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.action, AuditAction::Flagged);
        assert_eq!(entry.details, "Vote flagged for review");

        let response = put_json(
            &client,
            format!("/votes/{}/verification", Id::new()),
            json!({ "is_verified": true }),
        )
        .await;
        assert_eq!(response.status(), Status::NotFound);
    }
}
