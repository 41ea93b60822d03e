use chrono::Utc;
use mongodb::{bson::doc, options::FindOptions, Client, Database};
use rocket::{futures::TryStreamExt, serde::json::Json, Route, State};

use crate::error::{Error, Result};
use crate::ledger::{self, tally};
use crate::model::{
    api::{
        audit::{AuditLogEntry, VoteSummary},
        auth::{AdminPrincipal, Capability, Principal},
        pagination::{Paginated, PaginationRequest},
        results::{ElectionResults, ElectionStatistics, Participation},
    },
    common::{audit::AuditAction, granularity::Granularity, window::VotingWindow},
    db::{
        audit_log::VoteAuditLog, candidate::Candidate, election::Election,
        election_event::ElectionEvent, user::User, vote::Vote, voter_profile::VoterProfile,
    },
    mongodb::{Coll, Id},
};

use super::common::{candidate_ids, election_by_id, event_by_id, voter_email};

pub fn routes() -> Vec<Route> {
    routes![
        election_results,
        election_statistics,
        event_participation,
        audit_logs
    ]
}

/// Results are open to admins at any time, and to the event's voters once voting has ended.
#[get("/elections/<election_id>/results")]
async fn election_results(
    principal: Principal,
    election_id: Id,
    elections: Coll<Election>,
    db_client: &State<Client>,
    db: &State<Database>,
) -> Result<Json<ElectionResults>> {
    let election = election_by_id(election_id, &elections).await?;

    if !principal.has(Capability::ElectionAdmin) {
        let covered = principal
            .voter_profile
            .as_ref()
            .map_or(false, |p| ledger::profile_covers(p, &election));
        if !covered {
            return Err(Error::PermissionDenied(
                "ElectionAdmin capability required".to_string(),
            ));
        }
        if !election.has_ended_at(Utc::now()) {
            return Err(Error::PermissionDenied(
                "Results are available once the election has ended".to_string(),
            ));
        }
    }

    Ok(Json(tally::election_results(db_client, db, &election).await?))
}

#[get("/elections/<election_id>/statistics?<granularity>")]
async fn election_statistics(
    _admin: AdminPrincipal,
    election_id: Id,
    granularity: Option<Granularity>,
    elections: Coll<Election>,
    db_client: &State<Client>,
    db: &State<Database>,
) -> Result<Json<ElectionStatistics>> {
    let election = election_by_id(election_id, &elections).await?;
    let statistics = tally::election_statistics(
        db_client,
        db,
        &election,
        granularity.unwrap_or_default(),
    )
    .await?;
    Ok(Json(statistics))
}

#[get("/events/<event_id>/participation")]
async fn event_participation(
    _admin: AdminPrincipal,
    event_id: Id,
    events: Coll<ElectionEvent>,
    db_client: &State<Client>,
    db: &State<Database>,
) -> Result<Json<Participation>> {
    let event = event_by_id(event_id, &events).await?;
    Ok(Json(tally::event_participation(db_client, db, &event).await?))
}

/// Audit log entries, newest first.
#[allow(clippy::too_many_arguments)]
#[get("/audit-logs?<action>&<election_id>&<pagination..>")]
async fn audit_logs(
    _admin: AdminPrincipal,
    action: Option<AuditAction>,
    election_id: Option<Id>,
    pagination: PaginationRequest,
    audit_logs: Coll<VoteAuditLog>,
    votes: Coll<Vote>,
    profiles: Coll<VoterProfile>,
    users: Coll<User>,
    candidates: Coll<Candidate>,
    elections: Coll<Election>,
) -> Result<Json<Paginated<AuditLogEntry>>> {
    let mut filter = doc! {};
    if let Some(action) = action {
        filter.insert("action", action);
    }
    if let Some(election_id) = election_id {
        let candidate_ids = candidate_ids(&[election_id], &candidates).await?;
        let election_votes: Vec<Vote> = votes
            .find(doc! { "candidate_id": { "$in": candidate_ids } }, None)
            .await?
            .try_collect()
            .await?;
        let vote_ids: Vec<Id> = election_votes.iter().map(|v| v.id).collect();
        filter.insert("vote_id", doc! { "$in": vote_ids });
    }

    let total = audit_logs.count_documents(filter.clone(), None).await?;
    let options = FindOptions::builder()
        .sort(doc! { "created_at": -1, "_id": -1 })
        .skip(pagination.skip())
        .limit(pagination.limit())
        .build();
    let entries: Vec<VoteAuditLog> = audit_logs
        .find(filter, options)
        .await?
        .try_collect()
        .await?;

    let mut items = Vec::with_capacity(entries.len());
    for entry in entries {
        let performed_by_email = match entry.performed_by {
            Some(user_id) => users
                .find_one(user_id.as_doc(), None)
                .await?
                .map(|u| u.user.email),
            None => None,
        };
        let vote_details = match votes.find_one(entry.vote_id.as_doc(), None).await? {
            Some(vote) => Some(vote_summary(&vote, &profiles, &users, &candidates, &elections).await?),
            None => None,
        };
        items.push(AuditLogEntry {
            id: entry.id.into(),
            action: entry.action,
            performed_by_email,
            details: entry.entry.details,
            ip_address: entry.entry.ip_address,
            created_at: entry.entry.created_at,
            vote_details,
        });
    }

    Ok(Json(pagination.to_paginated(total, items)))
}

async fn vote_summary(
    vote: &Vote,
    profiles: &Coll<VoterProfile>,
    users: &Coll<User>,
    candidates: &Coll<Candidate>,
    elections: &Coll<Election>,
) -> Result<VoteSummary> {
    let candidate = candidates.find_one(vote.candidate_id.as_doc(), None).await?;
    let election_title = match &candidate {
        Some(c) => elections
            .find_one(c.election_id.as_doc(), None)
            .await?
            .map(|e| e.election.title),
        None => None,
    };
    Ok(VoteSummary {
        vote_id: vote.id.into(),
        voter_email: voter_email(vote.voter_id, profiles, users).await?,
        candidate_name: candidate.map(|c| c.full_name()),
        election_title,
    })
}
