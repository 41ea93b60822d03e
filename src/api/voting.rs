use chrono::Utc;
use mongodb::{bson::doc, Client, Database};
use rocket::{futures::TryStreamExt, http::Status, serde::json::Json, Route, State};

use crate::error::{Error, Result};
use crate::ledger::{self, Caster};
use crate::model::{
    api::{
        auth::{Capability, Principal, VoterPrincipal},
        client::ClientAddress,
        election::{CandidateDescription, ElectionDescription},
        vote::{Verification, VerifyRequest, VoteCastRequest, VoteConfirmation, VoteDetail, VoteStatus},
    },
    common::window::VotingWindow,
    db::{
        candidate::Candidate, election::Election, user::User, vote::Vote,
        voter_profile::VoterProfile,
    },
    mongodb::{Coll, Id},
};
use crate::notify::Notifier;
use crate::throttle::Throttled;

use super::common::{candidate_ids, election_by_id, ensure_can_view, vote_detail};

pub fn routes() -> Vec<Route> {
    routes![
        cast_vote,
        my_votes,
        get_vote,
        verify_vote,
        vote_status,
        available_elections,
        get_elections,
        get_election,
        get_candidates,
    ]
}

#[post("/votes", data = "<request>", format = "json")]
async fn cast_vote(
    voter: VoterPrincipal,
    request: Json<VoteCastRequest>,
    address: ClientAddress,
    db_client: &State<Client>,
    db: &State<Database>,
    notifier: &State<Box<dyn Notifier>>,
) -> Result<(Status, Json<VoteConfirmation>)> {
    let caster = Caster {
        user: &voter.user,
        profile: &voter.profile,
        address,
    };
    let outcome = ledger::cast_vote(
        db_client,
        db,
        caster,
        request.candidate_id.into(),
        notifier.inner().as_ref(),
    )
    .await?;

    let confirmation = VoteConfirmation {
        id: outcome.vote.id.into(),
        vote_hash: outcome.vote.vote.vote_hash,
        election_id: outcome.election.id.into(),
        election_title: outcome.election.election.title,
        candidate_name: outcome.candidate.full_name(),
        created_at: outcome.vote.vote.created_at,
        message: "Vote cast successfully. Keep the vote hash to verify your vote later."
            .to_string(),
    };
    Ok((Status::Created, Json(confirmation)))
}

/// The caller's own votes, optionally restricted to one election.
#[get("/votes?<election_id>")]
async fn my_votes(
    voter: VoterPrincipal,
    election_id: Option<Id>,
    votes: Coll<Vote>,
    profiles: Coll<VoterProfile>,
    users: Coll<User>,
    candidates: Coll<Candidate>,
    elections: Coll<Election>,
) -> Result<Json<Vec<VoteDetail>>> {
    let mut filter = doc! { "voter_id": voter.profile.id };
    if let Some(election_id) = election_id {
        let candidate_ids = candidate_ids(&[election_id], &candidates).await?;
        filter.insert("candidate_id", doc! { "$in": candidate_ids });
    }
    let own_votes: Vec<Vote> = votes.find(filter, None).await?.try_collect().await?;

    let mut details = Vec::with_capacity(own_votes.len());
    for vote in own_votes {
        details.push(vote_detail(vote, &profiles, &users, &candidates, &elections).await?);
    }
    Ok(Json(details))
}

/// A single vote, visible to its owner and to election admins.
#[get("/votes/<vote_id>")]
async fn get_vote(
    principal: Principal,
    vote_id: Id,
    votes: Coll<Vote>,
    profiles: Coll<VoterProfile>,
    users: Coll<User>,
    candidates: Coll<Candidate>,
    elections: Coll<Election>,
) -> Result<Json<VoteDetail>> {
    let vote = votes
        .find_one(vote_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Vote with ID '{vote_id}'")))?;

    let is_owner = principal
        .voter_profile
        .as_ref()
        .map_or(false, |p| p.id == vote.voter_id);
    if !is_owner && !principal.has(Capability::ElectionAdmin) {
        return Err(Error::PermissionDenied(
            "Only the voter or an election admin may view this vote".to_string(),
        ));
    }

    Ok(Json(
        vote_detail(vote, &profiles, &users, &candidates, &elections).await?,
    ))
}

/// Public receipt check. Throttled per client.
#[post("/votes/verify", data = "<request>", format = "json")]
async fn verify_vote(
    _throttled: Throttled,
    request: Json<VerifyRequest>,
    db_client: &State<Client>,
    db: &State<Database>,
) -> Result<Json<Verification>> {
    Ok(Json(
        ledger::verify_receipt(db_client, db, &request.vote_hash).await?,
    ))
}

#[get("/elections/<election_id>/vote-status")]
async fn vote_status(
    voter: VoterPrincipal,
    election_id: Id,
    elections: Coll<Election>,
    candidates: Coll<Candidate>,
    votes: Coll<Vote>,
) -> Result<Json<VoteStatus>> {
    let election = election_by_id(election_id, &elections).await?;
    if !ledger::profile_covers(&voter.profile, &election) {
        return Err(Error::PermissionDenied(
            "Election belongs to another election event".to_string(),
        ));
    }

    let candidate_ids = candidate_ids(&[election_id], &candidates).await?;
    let filter = doc! {
        "voter_id": voter.profile.id,
        "candidate_id": { "$in": candidate_ids },
    };
    let has_voted = votes.count_documents(filter, None).await? > 0;

    Ok(Json(VoteStatus {
        has_voted,
        election_id: election.id.into(),
        election_status: election.state_at(Utc::now()),
        election_title: election.election.title,
    }))
}

/// Open elections of the caller's event in which they have not voted yet.
#[get("/elections/available")]
async fn available_elections(
    voter: VoterPrincipal,
    elections: Coll<Election>,
    votes: Coll<Vote>,
) -> Result<Json<Vec<ElectionDescription>>> {
    let of_event = doc! { "election_event_id": voter.profile.election_event_id };
    let event_elections: Vec<Election> = elections.find(of_event, None).await?.try_collect().await?;

    let own_votes: Vec<Vote> = votes
        .find(doc! { "voter_id": voter.profile.id }, None)
        .await?
        .try_collect()
        .await?;
    let voted_in: Vec<Id> = own_votes.iter().map(|v| v.election_id).collect();

    let now = Utc::now();
    Ok(Json(
        event_elections
            .into_iter()
            .filter(|e| e.is_open_at(now) && !voted_in.contains(&e.id))
            .map(Into::into)
            .collect(),
    ))
}

/// Admins see every election, optionally by event; voters see their own event's.
#[get("/elections?<event_id>")]
async fn get_elections(
    principal: Principal,
    event_id: Option<Id>,
    elections: Coll<Election>,
) -> Result<Json<Vec<ElectionDescription>>> {
    let filter = if principal.has(Capability::ElectionAdmin) {
        event_id.map(|id| doc! { "election_event_id": id })
    } else if let Some(profile) = &principal.voter_profile {
        Some(doc! { "election_event_id": profile.election_event_id })
    } else {
        return Err(Error::PermissionDenied(
            "Voter or ElectionAdmin capability required".to_string(),
        ));
    };

    let found: Vec<Election> = elections.find(filter, None).await?.try_collect().await?;
    Ok(Json(found.into_iter().map(Into::into).collect()))
}

#[get("/elections/<election_id>")]
async fn get_election(
    principal: Principal,
    election_id: Id,
    elections: Coll<Election>,
) -> Result<Json<ElectionDescription>> {
    let election = election_by_id(election_id, &elections).await?;
    ensure_can_view(&principal, &election)?;
    Ok(Json(election.into()))
}

#[get("/elections/<election_id>/candidates")]
async fn get_candidates(
    principal: Principal,
    election_id: Id,
    elections: Coll<Election>,
    candidates: Coll<Candidate>,
) -> Result<Json<Vec<CandidateDescription>>> {
    let election = election_by_id(election_id, &elections).await?;
    ensure_can_view(&principal, &election)?;

    let found: Vec<Candidate> = candidates
        .find(doc! { "election_id": election_id }, None)
        .await?
        .try_collect()
        .await?;
    Ok(Json(found.into_iter().map(Into::into).collect()))
}

#[cfg(test)]
mod tests {
    use rocket::{
        http::{ContentType, Header},
        local::asynchronous::{Client, LocalResponse},
        serde::json::{json, Value},
    };

    use crate::api::testing::{add_admin, log_in_as};
    use crate::ledger::fixtures::{add_voter, seeded_polling};
    use crate::model::api::credentials::LoginRequest;

    use super::*;

    async fn cast(client: &Client, candidate_id: Id) -> LocalResponse<'_> {
        client
            .post(uri!(cast_vote))
            .header(ContentType::JSON)
            .header(Header::new("X-Forwarded-For", "203.0.113.7, 10.0.0.1"))
            .body(json!({ "candidate_id": candidate_id.to_string() }).to_string())
            .dispatch()
            .await
    }

    async fn verify<'c>(client: &'c Client, vote_hash: &str) -> LocalResponse<'c> {
        client
            .post(uri!(verify_vote))
            .header(ContentType::JSON)
            .body(json!({ "vote_hash": vote_hash }).to_string())
            .dispatch()
            .await
    }

    #[backend_test(voter)]
    async fn cast_and_verify_receipt(client: Client, db: Database) {
        let polling = seeded_polling(&db).await;
        let bob = &polling.candidates[1];

        let response = cast(&client, bob.id).await;
        assert_eq!(response.status(), Status::Created);
        let confirmation: VoteConfirmation = response.into_json().await.unwrap();
        assert_eq!(confirmation.candidate_name, "Bob Example");
        assert_eq!(Id::from(confirmation.election_id), polling.election.id);

        // Receipts are matched case-insensitively and ignoring surrounding whitespace.
        let typed = format!("  {}\n", confirmation.vote_hash.to_uppercase());
        let response = verify(&client, &typed).await;
        assert_eq!(response.status(), Status::Ok);
        let verification: Verification = response.into_json().await.unwrap();
        assert!(verification.verified);
        assert!(verification.is_verified);
        assert_eq!(verification.vote_id, confirmation.id);
        assert_eq!(verification.candidate_name, "Bob Example");
        assert_eq!(verification.election_title, polling.election.title);

        // The audit entry records the forwarded client address.
        let entry = Coll::<crate::model::db::audit_log::VoteAuditLog>::from_db(&db)
            .find_one(None, None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.ip_address.as_deref(), Some("203.0.113.7"));
    }

    #[backend_test(voter)]
    async fn unknown_receipt_not_found(client: Client, db: Database) {
        seeded_polling(&db).await;
        let response = verify(&client, &"0".repeat(64)).await;
        assert_eq!(response.status(), Status::NotFound);
        let body: Value = response.into_json().await.unwrap();
        assert_eq!(body["verified"], json!(false));
        assert_eq!(body["error"], json!("hash_not_found"));
    }

    #[backend_test(voter)]
    async fn duplicate_vote_reported(client: Client, db: Database) {
        let polling = seeded_polling(&db).await;
        assert_eq!(cast(&client, polling.candidates[0].id).await.status(), Status::Created);

        let response = cast(&client, polling.candidates[2].id).await;
        assert_eq!(response.status(), Status::BadRequest);
        let body: Value = response.into_json().await.unwrap();
        assert_eq!(body["error"], json!("duplicate_vote"));

        let response = cast(&client, Id::new()).await;
        assert_eq!(response.status(), Status::BadRequest);
        let body: Value = response.into_json().await.unwrap();
        assert_eq!(body["error"], json!("invalid_candidate"));
    }

    #[backend_test(voter)]
    async fn vote_status_and_available_elections(client: Client, db: Database) {
        let polling = seeded_polling(&db).await;

        let status: VoteStatus = client
            .get(uri!(vote_status(polling.election.id)))
            .dispatch()
            .await
            .into_json()
            .await
            .unwrap();
        assert!(!status.has_voted);

        let available: Vec<ElectionDescription> = client
            .get(uri!(available_elections))
            .dispatch()
            .await
            .into_json()
            .await
            .unwrap();
        assert_eq!(available.len(), 1);

        cast(&client, polling.candidates[0].id).await;

        let status: VoteStatus = client
            .get(uri!(vote_status(polling.election.id)))
            .dispatch()
            .await
            .into_json()
            .await
            .unwrap();
        assert!(status.has_voted);

        let available: Vec<ElectionDescription> = client
            .get(uri!(available_elections))
            .dispatch()
            .await
            .into_json()
            .await
            .unwrap();
        assert!(available.is_empty());

        let mine: Vec<VoteDetail> = client
            .get(uri!(my_votes(Some(polling.election.id))))
            .dispatch()
            .await
            .into_json()
            .await
            .unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].voter_email, polling.user.email);
    }

    #[backend_test(voter)]
    async fn votes_visible_to_owner_and_admins_only(client: Client, db: Database) {
        let polling = seeded_polling(&db).await;
        let confirmation: VoteConfirmation = cast(&client, polling.candidates[0].id)
            .await
            .into_json()
            .await
            .unwrap();
        let vote_id: Id = confirmation.id.into();

        let response = client.get(uri!(get_vote(vote_id))).dispatch().await;
        assert_eq!(response.status(), Status::Ok);

        // Another voter on the same roll.
        add_voter(&db, polling.event.id, "neighbour@nexavote.test", true).await;
        log_in_as(
            &client,
            &LoginRequest::new(
                "neighbour@nexavote.test",
                crate::model::db::user::examples::EXAMPLE_PASSWORD,
            ),
        )
        .await;
        let response = client.get(uri!(get_vote(vote_id))).dispatch().await;
        assert_eq!(response.status(), Status::Forbidden);

        add_admin(&db).await;
        log_in_as(&client, &LoginRequest::admin_example()).await;
        let response = client.get(uri!(get_vote(vote_id))).dispatch().await;
        assert_eq!(response.status(), Status::Ok);
    }

    #[backend_test(voter)]
    async fn casting_requires_a_voter(client: Client, db: Database) {
        let polling = seeded_polling(&db).await;

        add_admin(&db).await;
        log_in_as(&client, &LoginRequest::admin_example()).await;
        assert_eq!(
            cast(&client, polling.candidates[0].id).await.status(),
            Status::Forbidden
        );

        client.delete(uri!(crate::api::auth::logout)).dispatch().await;
        let response = cast(&client, polling.candidates[0].id).await;
        assert_eq!(response.status(), Status::Unauthorized);
        let body: rocket::serde::json::Value = response.into_json().await.unwrap();
        assert_eq!(body["error"], "authentication_required");
        assert_eq!(Coll::<Vote>::from_db(&db).count_documents(None, None).await.unwrap(), 0);
    }

    #[backend_test]
    async fn verification_is_throttled(client: Client) {
        let limit = client
            .rocket()
            .state::<crate::config::Config>()
            .unwrap()
            .verify_rate_limit();
        let unknown = "f".repeat(64);
        for _ in 0..limit {
            assert_eq!(verify(&client, &unknown).await.status(), Status::NotFound);
        }
        assert_eq!(
            verify(&client, &unknown).await.status(),
            Status::TooManyRequests
        );
    }

    #[backend_test(voter)]
    async fn voters_see_only_their_event(client: Client, db: Database) {
        let polling = seeded_polling(&db).await;

        let other_event = crate::model::db::election_event::ElectionEvent::current_example();
        Coll::<crate::model::db::election_event::ElectionEvent>::from_db(&db)
            .insert_one(&other_event, None)
            .await
            .unwrap();
        let (foreign, _) = crate::ledger::fixtures::add_election(
            &db,
            Election::example_in(&other_event),
            &["Zed"],
        )
        .await;

        let listed: Vec<ElectionDescription> = client
            .get(uri!(get_elections(_)))
            .dispatch()
            .await
            .into_json()
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(Id::from(listed[0].id), polling.election.id);

        let response = client.get(uri!(get_election(foreign.id))).dispatch().await;
        assert_eq!(response.status(), Status::Forbidden);
        let response = client.get(uri!(get_candidates(foreign.id))).dispatch().await;
        assert_eq!(response.status(), Status::Forbidden);

        let candidates: Vec<CandidateDescription> = client
            .get(uri!(get_candidates(polling.election.id)))
            .dispatch()
            .await
            .into_json()
            .await
            .unwrap();
        assert_eq!(candidates.len(), 3);
    }
}
