use mongodb::{bson::doc, options::SessionOptions, Client, Database};

use crate::error::{Error, Result};
use crate::model::{
    api::vote::Verification,
    db::{candidate::Candidate, election::Election, vote::Vote},
    mongodb::Coll,
};

/// Look up a receipt hash.
///
/// A miss is [`Error::HashNotFound`]. A hit is always `verified: true`, even when the
/// vote has been flagged: verification answers "was this recorded", and the
/// moderation flag is reported separately as `is_verified`.
pub async fn verify_receipt(
    db_client: &Client,
    db: &Database,
    vote_hash: &str,
) -> Result<Verification> {
    let vote_hash = vote_hash.trim().to_lowercase();
    if vote_hash.is_empty() {
        return Err(Error::bad_request("Vote hash is required"));
    }

    let session_options = SessionOptions::builder().snapshot(true).build();
    let mut session = db_client.start_session(Some(session_options)).await?;

    let vote = Coll::<Vote>::from_db(db)
        .find_one_with_session(doc! { "vote_hash": &vote_hash }, None, &mut session)
        .await?
        .ok_or(Error::HashNotFound)?;
    let candidate = Coll::<Candidate>::from_db(db)
        .find_one_with_session(vote.candidate_id.as_doc(), None, &mut session)
        .await?
        .ok_or(Error::HashNotFound)?;
    let election = Coll::<Election>::from_db(db)
        .find_one_with_session(candidate.election_id.as_doc(), None, &mut session)
        .await?
        .ok_or(Error::HashNotFound)?;

    debug!("Verified receipt for vote {}", vote.id);
    Ok(Verification {
        verified: true,
        vote_id: vote.id.into(),
        election_title: election.election.title,
        candidate_name: candidate.full_name(),
        created_at: vote.created_at,
        is_verified: vote.is_verified,
    })
}
