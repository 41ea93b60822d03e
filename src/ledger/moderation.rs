use mongodb::{bson::doc, Client, Database};

use crate::error::{Error, Result};
use crate::model::{
    api::client::ClientAddress,
    common::audit::AuditAction,
    db::{audit_log::VoteAuditLog, vote::Vote},
    mongodb::{Coll, Id},
};

/// Set the moderation flag of a vote, recording a `verified` or `flagged` audit entry
/// in the same transaction. This is the only mutation a vote ever undergoes.
pub async fn set_verification(
    db_client: &Client,
    db: &Database,
    vote_id: Id,
    is_verified: bool,
    details: String,
    performed_by: Id,
    address: ClientAddress,
) -> Result<Vote> {
    let votes = Coll::<Vote>::from_db(db);
    let audit_logs = Coll::<VoteAuditLog>::from_db(db);

    let mut session = db_client.start_session(None).await?;
    session.start_transaction(None).await?;

    let mut vote = votes
        .find_one_with_session(vote_id.as_doc(), None, &mut session)
        .await?
        .ok_or_else(|| Error::not_found(format!("Vote with ID '{vote_id}'")))?;

    let update = doc! { "$set": { "is_verified": is_verified } };
    votes
        .update_one_with_session(vote_id.as_doc(), update, None, &mut session)
        .await?;

    let action = AuditAction::for_verification(is_verified);
    let details = if details.trim().is_empty() {
        match action {
            AuditAction::Verified => "Vote marked as verified".to_string(),
            _ => "Vote flagged for review".to_string(),
        }
    } else {
        details
    };
    let audit = VoteAuditLog::new(
        vote_id,
        action,
        Some(performed_by),
        details,
        address.to_option_string(),
    );
    audit_logs
        .insert_one_with_session(&audit, None, &mut session)
        .await?;

    session.commit_transaction().await?;
    info!("Vote {vote_id} {action} by user {performed_by}");

    vote.vote.is_verified = is_verified;
    Ok(vote)
}
