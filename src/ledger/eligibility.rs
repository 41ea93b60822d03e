use mongodb::{bson::doc, ClientSession};

use crate::error::Result;
use crate::model::{
    db::{election::Election, invitation::Invitation, user::User, voter_profile::VoterProfile},
    mongodb::Coll,
};

/// Does this voter profile put its holder on the roll of the election's event?
pub fn profile_covers(profile: &VoterProfile, election: &Election) -> bool {
    profile.election_event_id == election.election_event_id
}

/// Is the voter eligible to vote in the election?
///
/// Re-derived on every call: the voter must be on the event's roll and hold a used
/// invitation for their email under that event. Revoking the invitation blocks
/// future votes but never touches past ones.
pub async fn is_eligible(
    invitations: &Coll<Invitation>,
    session: &mut ClientSession,
    user: &User,
    profile: &VoterProfile,
    election: &Election,
) -> Result<bool> {
    if !profile_covers(profile, election) {
        return Ok(false);
    }

    let filter = doc! {
        "email": &user.email,
        "election_event_id": election.election_event_id,
        "is_used": true,
    };
    let used = invitations
        .count_documents_with_session(filter, None, session)
        .await?;
    Ok(used > 0)
}
