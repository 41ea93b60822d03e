use chrono::Utc;
use mongodb::{bson::doc, error::Error as DbError, Client, ClientSession, Database};

use crate::error::{Error, Result};
use crate::model::{
    api::client::ClientAddress,
    common::{audit::AuditAction, window::VotingWindow},
    db::{
        audit_log::VoteAuditLog,
        candidate::Candidate,
        election::Election,
        election_event::ElectionEvent,
        user::User,
        vote::Vote,
        voter_profile::VoterProfile,
    },
    mongodb::{
        errors::{is_duplicate_key_error, is_write_conflict_error},
        Coll, Id,
    },
};
use crate::notify::{Notifier, VoteCastEvent};

use super::eligibility::is_eligible;

/// The principal casting a vote, and where from.
#[derive(Debug, Clone, Copy)]
pub struct Caster<'a> {
    pub user: &'a User,
    pub profile: &'a VoterProfile,
    pub address: ClientAddress,
}

/// A committed vote, with the records it was validated against.
#[derive(Debug, Clone)]
pub struct CastOutcome {
    pub vote: Vote,
    pub candidate: Candidate,
    pub election: Election,
}

/// Cast a vote for the given candidate.
///
/// Checks, in order: the candidate exists, the election is open, the voter is
/// eligible, the voter has not yet voted in this election. The vote and its `cast`
/// audit entry are then written in one transaction. The notifier is only told once
/// the transaction has committed, and its failures never affect the vote.
pub async fn cast_vote(
    db_client: &Client,
    db: &Database,
    caster: Caster<'_>,
    candidate_id: Id,
    notifier: &dyn Notifier,
) -> Result<CastOutcome> {
    let outcome = {
        let mut session = db_client.start_session(None).await?;
        session.start_transaction(None).await?;

        // Dropping the session aborts the transaction on any early return.
        let checked: Result<CastOutcome> = async {
            let outcome = validate_and_record(db, &mut session, caster, candidate_id).await?;
            confirm_still_open(db, &outcome.election).await?;
            Ok(outcome)
        }
        .await;
        let outcome = match checked {
            Ok(outcome) => outcome,
            Err(e) => {
                if !matches!(e, Error::Db(_)) {
                    warn!("Rejected vote by voter {}: {}", caster.profile.id, e.kind());
                }
                return Err(e);
            }
        };

        session
            .commit_transaction()
            .await
            .map_err(vote_write_error)?;
        outcome
    };

    info!(
        "Vote {} cast in election {}",
        outcome.vote.id, outcome.election.id
    );

    let event = VoteCastEvent {
        vote_id: outcome.vote.id,
        election_id: outcome.election.id,
        election_title: outcome.election.title.clone(),
        voter_email: caster.user.email.clone(),
        vote_hash: outcome.vote.vote_hash.clone(),
        created_at: outcome.vote.created_at,
    };
    if let Err(e) = notifier.vote_cast(&event).await {
        error!("Vote {} committed but notification failed: {e}", outcome.vote.id);
    }

    Ok(outcome)
}

async fn validate_and_record(
    db: &Database,
    session: &mut ClientSession,
    caster: Caster<'_>,
    candidate_id: Id,
) -> Result<CastOutcome> {
    let candidate = Coll::<Candidate>::from_db(db)
        .find_one_with_session(candidate_id.as_doc(), None, session)
        .await?
        .ok_or_else(|| Error::InvalidCandidate(format!("No candidate with ID {candidate_id}")))?;

    let election = Coll::<Election>::from_db(db)
        .find_one_with_session(candidate.election_id.as_doc(), None, session)
        .await?
        .ok_or_else(|| {
            Error::InvalidCandidate(format!("Candidate {candidate_id} has no election"))
        })?;

    // Deactivating the event closes all of its elections too.
    let event = Coll::<ElectionEvent>::from_db(db)
        .find_one_with_session(election.election_event_id.as_doc(), None, session)
        .await?;
    let now = Utc::now();
    let open = election.is_open_at(now) && event.map_or(false, |e| e.is_open_at(now));
    if !open {
        return Err(Error::ElectionClosed);
    }

    let eligible = is_eligible(
        &Coll::from_db(db),
        session,
        caster.user,
        caster.profile,
        &election,
    )
    .await?;
    if !eligible {
        return Err(Error::NotEligible);
    }

    let existing = doc! {
        "voter_id": caster.profile.id,
        "election_id": election.id,
    };
    let already_voted = Coll::<Vote>::from_db(db)
        .count_documents_with_session(existing, None, session)
        .await?;
    if already_voted > 0 {
        return Err(Error::DuplicateVote);
    }

    let vote = Vote::new(caster.profile.id, &candidate);
    let audit = VoteAuditLog::new(
        vote.id,
        AuditAction::Cast,
        Some(caster.user.id),
        format!("Vote cast for candidate {}", candidate.full_name()),
        caster.address.to_option_string(),
    );
    record_vote(&Coll::from_db(db), &Coll::from_db(db), session, &vote, &audit).await?;

    Ok(CastOutcome {
        vote,
        candidate,
        election,
    })
}

/// Re-read the election and its event outside the transaction's snapshot, so a
/// deactivation committed while the vote was being validated still rejects it.
async fn confirm_still_open(db: &Database, election: &Election) -> Result<()> {
    let election = Coll::<Election>::from_db(db)
        .find_one(election.id.as_doc(), None)
        .await?;
    let event = match &election {
        Some(election) => {
            Coll::<ElectionEvent>::from_db(db)
                .find_one(election.election_event_id.as_doc(), None)
                .await?
        }
        None => None,
    };
    let now = Utc::now();
    match (election, event) {
        (Some(election), Some(event)) if election.is_open_at(now) && event.is_open_at(now) => {
            Ok(())
        }
        _ => Err(Error::ElectionClosed),
    }
}

/// Write a vote and its audit entry within the session's transaction.
///
/// A (voter, election) uniqueness violation, whether reported as a duplicate key or
/// as a conflict with a concurrent transaction, becomes [`Error::DuplicateVote`].
pub async fn record_vote(
    votes: &Coll<Vote>,
    audit_logs: &Coll<VoteAuditLog>,
    session: &mut ClientSession,
    vote: &Vote,
    audit: &VoteAuditLog,
) -> Result<()> {
    votes
        .insert_one_with_session(vote, None, session)
        .await
        .map_err(vote_write_error)?;
    audit_logs
        .insert_one_with_session(audit, None, session)
        .await?;
    Ok(())
}

fn vote_write_error(err: DbError) -> Error {
    if is_duplicate_key_error(&err) || is_write_conflict_error(&err) {
        Error::DuplicateVote
    } else {
        Error::Db(err)
    }
}
