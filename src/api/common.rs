use mongodb::bson::doc;

use crate::error::{Error, Result};
use crate::model::{
    api::{auth::Principal, auth::Capability, vote::VoteDetail},
    db::{
        candidate::Candidate, election::Election, election_event::ElectionEvent, user::User,
        vote::Vote, voter_profile::VoterProfile,
    },
    mongodb::{Coll, Id},
};

/// Fetch an election event by ID.
pub async fn event_by_id(event_id: Id, events: &Coll<ElectionEvent>) -> Result<ElectionEvent> {
    events
        .find_one(event_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Election event with ID '{event_id}'")))
}

/// Fetch an election by ID.
pub async fn election_by_id(election_id: Id, elections: &Coll<Election>) -> Result<Election> {
    elections
        .find_one(election_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Election with ID '{election_id}'")))
}

/// Fetch a candidate by ID.
pub async fn candidate_by_id(candidate_id: Id, candidates: &Coll<Candidate>) -> Result<Candidate> {
    candidates
        .find_one(candidate_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Candidate with ID '{candidate_id}'")))
}

/// May this principal see the given election at all?
///
/// Admins see everything; voters see the elections of their own event.
pub fn can_view_election(principal: &Principal, election: &Election) -> bool {
    principal.has(Capability::ElectionAdmin)
        || principal
            .voter_profile
            .as_ref()
            .map_or(false, |p| p.election_event_id == election.election_event_id)
}

/// Fail with [`Error::PermissionDenied`] unless the principal may see the election.
pub fn ensure_can_view(principal: &Principal, election: &Election) -> Result<()> {
    if can_view_election(principal, election) {
        Ok(())
    } else {
        Err(Error::PermissionDenied(
            "Election belongs to another election event".to_string(),
        ))
    }
}

/// Resolve a vote into its displayable form, joining through the candidate to the election.
pub async fn vote_detail(
    vote: Vote,
    profiles: &Coll<VoterProfile>,
    users: &Coll<User>,
    candidates: &Coll<Candidate>,
    elections: &Coll<Election>,
) -> Result<VoteDetail> {
    let candidate = candidate_by_id(vote.candidate_id, candidates).await?;
    let election = election_by_id(candidate.election_id, elections).await?;
    let voter_email = voter_email(vote.voter_id, profiles, users)
        .await?
        .unwrap_or_default();

    Ok(VoteDetail {
        id: vote.id.into(),
        voter_email,
        candidate_id: candidate.id.into(),
        candidate_name: candidate.full_name(),
        election_id: election.id.into(),
        election_title: election.election.title,
        vote_hash: vote.vote.vote_hash,
        is_verified: vote.vote.is_verified,
        created_at: vote.vote.created_at,
    })
}

/// The email of the user behind a voter profile, if both still exist.
pub async fn voter_email(
    voter_id: Id,
    profiles: &Coll<VoterProfile>,
    users: &Coll<User>,
) -> Result<Option<String>> {
    let Some(profile) = profiles.find_one(voter_id.as_doc(), None).await? else {
        return Ok(None);
    };
    let user = users.find_one(profile.user_id.as_doc(), None).await?;
    Ok(user.map(|u| u.user.email))
}

/// The IDs of every candidate standing in the given elections.
pub async fn candidate_ids(election_ids: &[Id], candidates: &Coll<Candidate>) -> Result<Vec<Id>> {
    use rocket::futures::TryStreamExt;

    let filter = doc! { "election_id": { "$in": election_ids.to_vec() } };
    let candidates: Vec<Candidate> = candidates.find(filter, None).await?.try_collect().await?;
    Ok(candidates.into_iter().map(|c| c.id).collect())
}
