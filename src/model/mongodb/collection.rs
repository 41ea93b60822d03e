use std::ops::Deref;

use mongodb::{
    bson::doc, error::Error as DbError, options::IndexOptions, Collection, Database, IndexModel,
};
use rocket::{
    request::{self, FromRequest, Request},
    State,
};

use crate::model::db::{
    audit_log::VoteAuditLog,
    candidate::{Candidate, NewCandidate},
    election::{Election, NewElection},
    election_event::{ElectionEvent, NewElectionEvent},
    invitation::{Invitation, NewInvitation},
    user::{NewUser, User},
    vote::Vote,
    voter_profile::{NewVoterProfile, VoterProfile},
};

/// A type that can be directly inserted/read to/from the database.
pub trait MongoCollection {
    /// The name of the collection.
    const NAME: &'static str;
}

/// A database collection of the given type.
pub struct Coll<T>(Collection<T>);

impl<T> Coll<T>
where
    T: MongoCollection,
{
    /// Get a handle on this collection in the given database.
    pub fn from_db(db: &Database) -> Self {
        Self(db.collection(T::NAME))
    }
}

// `Derive(Clone)` would only derive if `T: Clone`, but we don't need that bound.
impl<T> Clone for Coll<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Deref for Coll<T> {
    type Target = Collection<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[rocket::async_trait]
impl<'r, T> FromRequest<'r> for Coll<T>
where
    T: MongoCollection,
{
    type Error = ();

    /// Get the database connection from the managed state and wrap it in a collection.
    ///
    /// Panics iff the [`Database`] is not managed by [`rocket::Rocket`].
    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        let db = req.guard::<&State<Database>>().await.unwrap();
        request::Outcome::Success(Coll::from_db(db))
    }
}

macro_rules! collection {
    ($name:literal: $($ty:ty),+) => {
        $(
            impl MongoCollection for $ty {
                const NAME: &'static str = $name;
            }
        )+
    };
}

collection!("users": User, NewUser);
collection!("voter_profiles": VoterProfile, NewVoterProfile);
collection!("invitations": Invitation, NewInvitation);
collection!("election_events": ElectionEvent, NewElectionEvent);
collection!("elections": Election, NewElection);
collection!("candidates": Candidate, NewCandidate);
collection!("votes": Vote);
collection!("vote_audit_logs": VoteAuditLog);

/// Ensure that all the required indexes exist on the given database.
///
/// The unique indexes here are the source of truth for the data model's uniqueness
/// rules; application-level pre-checks only exist to give friendlier errors.
///
/// This operation is idempotent.
pub async fn ensure_indexes_exist(db: &Database) -> Result<(), DbError> {
    debug!("Ensuring collection indexes exist");

    let unique = IndexOptions::builder().unique(true).build();

    // Users: one account per email.
    let user_index = IndexModel::builder()
        .keys(doc! {"email": 1})
        .options(unique.clone())
        .build();
    Coll::<User>::from_db(db)
        .create_index(user_index, None)
        .await?;

    // Voter profiles: one-to-one with users.
    let profile_index = IndexModel::builder()
        .keys(doc! {"user_id": 1})
        .options(unique.clone())
        .build();
    Coll::<VoterProfile>::from_db(db)
        .create_index(profile_index, None)
        .await?;

    // Invitations: unique tokens, and at most one unused invitation per (email, event).
    let token_index = IndexModel::builder()
        .keys(doc! {"token": 1})
        .options(unique.clone())
        .build();
    let unused_invitation_index = IndexModel::builder()
        .keys(doc! {"email": 1, "election_event_id": 1})
        .options(
            IndexOptions::builder()
                .unique(true)
                .partial_filter_expression(doc! {"is_used": false})
                .build(),
        )
        .build();
    Coll::<Invitation>::from_db(db)
        .create_indexes([token_index, unused_invitation_index], None)
        .await?;

    // Elections: looked up by event.
    let election_index = IndexModel::builder()
        .keys(doc! {"election_event_id": 1})
        .build();
    Coll::<Election>::from_db(db)
        .create_index(election_index, None)
        .await?;

    // Candidates: a linked user stands at most once per election.
    let candidate_index = IndexModel::builder()
        .keys(doc! {"user_id": 1, "election_id": 1})
        .options(
            IndexOptions::builder()
                .unique(true)
                .partial_filter_expression(doc! {"user_id": {"$type": "objectId"}})
                .build(),
        )
        .build();
    Coll::<Candidate>::from_db(db)
        .create_index(candidate_index, None)
        .await?;

    // Votes: one per (voter, election), and unique receipts.
    let one_vote_index = IndexModel::builder()
        .keys(doc! {"voter_id": 1, "election_id": 1})
        .options(unique.clone())
        .build();
    let hash_index = IndexModel::builder()
        .keys(doc! {"vote_hash": 1})
        .options(unique)
        .build();
    let candidate_votes_index = IndexModel::builder()
        .keys(doc! {"candidate_id": 1, "created_at": 1})
        .build();
    Coll::<Vote>::from_db(db)
        .create_indexes([one_vote_index, hash_index, candidate_votes_index], None)
        .await?;

    // Audit logs: listed newest first, looked up by vote.
    let audit_index = IndexModel::builder()
        .keys(doc! {"vote_id": 1, "created_at": -1})
        .build();
    Coll::<VoteAuditLog>::from_db(db)
        .create_index(audit_index, None)
        .await?;

    Ok(())
}
