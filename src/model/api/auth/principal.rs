use mongodb::{bson::doc, Database};
use rocket::{
    http::Status,
    outcome::try_outcome,
    request::{FromRequest, Outcome},
    Request, State,
};

use crate::error::Error;
use crate::model::{
    db::{user::User, voter_profile::VoterProfile},
    mongodb::{Coll, Id},
};

use super::token::AuthToken;

/// Named permission classes.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Capability {
    /// Holds a voter profile, i.e. is on some event's voter roll.
    Voter,
    /// May administer events, elections, invitations, and read results.
    ElectionAdmin,
}

/// An authenticated caller, loaded fresh from the database for each request.
#[derive(Debug, Clone)]
pub struct Principal {
    pub user: User,
    pub voter_profile: Option<VoterProfile>,
}

impl Principal {
    pub fn id(&self) -> Id {
        self.user.id
    }

    pub fn has(&self, capability: Capability) -> bool {
        has_capability(self, capability)
    }

    /// All capabilities this principal holds.
    pub fn capabilities(&self) -> Vec<Capability> {
        [Capability::Voter, Capability::ElectionAdmin]
            .into_iter()
            .filter(|&c| self.has(c))
            .collect()
    }

    /// Fail with [`Error::PermissionDenied`] unless the capability is held.
    pub fn require(&self, capability: Capability) -> Result<(), Error> {
        if self.has(capability) {
            Ok(())
        } else {
            Err(Error::PermissionDenied(format!(
                "{capability:?} capability required"
            )))
        }
    }
}

/// The single place capabilities are evaluated.
pub fn has_capability(principal: &Principal, capability: Capability) -> bool {
    match capability {
        Capability::Voter => principal.voter_profile.is_some(),
        Capability::ElectionAdmin => principal.user.is_election_admin(),
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Principal {
    type Error = Error;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let token = try_outcome!(req.guard::<AuthToken>().await);
        // Unwrap is safe as the `Database` is always managed.
        let db = req.guard::<&State<Database>>().await.unwrap();

        let user = match Coll::<User>::from_db(db)
            .find_one(token.id.as_doc(), None)
            .await
        {
            Ok(Some(user)) => user,
            // The account was deleted after the token was issued.
            Ok(None) => {
                return Outcome::Failure((Status::Unauthorized, Error::AuthenticationRequired))
            }
            Err(e) => return Outcome::Failure((Status::InternalServerError, e.into())),
        };

        let voter_profile = match Coll::<VoterProfile>::from_db(db)
            .find_one(doc! { "user_id": user.id }, None)
            .await
        {
            Ok(profile) => profile,
            Err(e) => return Outcome::Failure((Status::InternalServerError, e.into())),
        };

        Outcome::Success(Self {
            user,
            voter_profile,
        })
    }
}

/// A principal holding the [`Capability::Voter`] capability.
#[derive(Debug, Clone)]
pub struct VoterPrincipal {
    pub user: User,
    pub profile: VoterProfile,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for VoterPrincipal {
    type Error = Error;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let principal = try_outcome!(req.guard::<Principal>().await);
        if let Err(e) = principal.require(Capability::Voter) {
            return Outcome::Failure((e.status(), e));
        }
        match principal.voter_profile {
            Some(profile) => Outcome::Success(Self {
                user: principal.user,
                profile,
            }),
            // `require` has already checked for the profile.
            None => Outcome::Forward(()),
        }
    }
}

/// A principal holding the [`Capability::ElectionAdmin`] capability.
#[derive(Debug, Clone)]
pub struct AdminPrincipal(pub Principal);

impl AdminPrincipal {
    pub fn id(&self) -> Id {
        self.0.id()
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AdminPrincipal {
    type Error = Error;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let principal = try_outcome!(req.guard::<Principal>().await);
        match principal.require(Capability::ElectionAdmin) {
            Ok(()) => Outcome::Success(Self(principal)),
            Err(e) => Outcome::Failure((e.status(), e)),
        }
    }
}
