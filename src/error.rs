use argon2::Error as Argon2Error;
use jsonwebtoken::errors::{Error as JwtError, ErrorKind as JwtErrorKind};
use mongodb::error::Error as DbError;
use rocket::{
    http::Status,
    response::{self, Responder},
    serde::json::{json, Json},
    Request,
};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    // Vote ledger rejections.
    #[error("Election is not currently open")]
    ElectionClosed,
    #[error("Voter is not eligible for this election event")]
    NotEligible,
    #[error("Voter has already cast a vote in this election")]
    DuplicateVote,
    #[error("Invalid candidate: {0}")]
    InvalidCandidate(String),
    #[error("Vote hash not found")]
    HashNotFound,

    // Access control.
    #[error("Authentication required")]
    AuthenticationRequired,
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    // Anything else the caller got wrong.
    #[error("{1}")]
    Status(Status, String),

    // Infrastructure.
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Jwt(#[from] JwtError),
    #[error(transparent)]
    Argon2(#[from] Argon2Error),
}

impl Error {
    pub fn not_found(what: String) -> Self {
        Self::Status(Status::NotFound, format!("Not found: {what}"))
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::Status(Status::BadRequest, msg.into())
    }

    /// The HTTP status this error is reported with.
    pub fn status(&self) -> Status {
        match self {
            Self::ElectionClosed
            | Self::NotEligible
            | Self::DuplicateVote
            | Self::InvalidCandidate(_) => Status::BadRequest,
            Self::HashNotFound => Status::NotFound,
            Self::AuthenticationRequired => Status::Unauthorized,
            Self::PermissionDenied(_) => Status::Forbidden,
            Self::Status(status, _) => *status,
            Self::Db(_) => Status::InternalServerError,
            Self::Jwt(err) => match err.kind() {
                JwtErrorKind::ExpiredSignature | JwtErrorKind::ImmatureSignature => {
                    Status::Unauthorized
                }
                _ => Status::BadRequest,
            },
            Self::Argon2(_) => Status::InternalServerError,
        }
    }

    /// A stable machine-readable name for the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ElectionClosed => "election_closed",
            Self::NotEligible => "not_eligible",
            Self::DuplicateVote => "duplicate_vote",
            Self::InvalidCandidate(_) => "invalid_candidate",
            Self::HashNotFound => "hash_not_found",
            Self::AuthenticationRequired => "authentication_required",
            Self::PermissionDenied(_) => "permission_denied",
            Self::Status(status, _) => status_kind(*status),
            Self::Db(_) | Self::Argon2(_) => "server_error",
            Self::Jwt(_) => "invalid_token",
        }
    }
}

/// Error kind names for errors identified only by their HTTP status.
pub fn status_kind(status: Status) -> &'static str {
    match status.code {
        400 => "bad_request",
        401 => "authentication_required",
        403 => "permission_denied",
        404 => "not_found",
        409 => "conflict",
        422 => "unprocessable_entity",
        429 => "too_many_requests",
        _ if status.code >= 500 => "server_error",
        _ => "error",
    }
}

impl<'r, 'o: 'r> Responder<'r, 'o> for Error {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'o> {
        let status = self.status();
        // Never leak infrastructure details to the caller.
        let message = if status.code >= 500 {
            error!("Internal error: {self}");
            "Internal server error".to_string()
        } else {
            debug!("Request failed with {status}: {self}");
            self.to_string()
        };
        let mut body = json!({
            "error": self.kind(),
            "message": message,
        });
        // Receipt lookups answer in the same shape whether they hit or miss.
        if let Self::HashNotFound = self {
            body["verified"] = json!(false);
        }
        response::Response::build_from(Json(body).respond_to(req)?)
            .status(status)
            .ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vote_rejections_are_client_errors() {
        for err in [
            Error::ElectionClosed,
            Error::NotEligible,
            Error::DuplicateVote,
            Error::InvalidCandidate("x".into()),
        ] {
            assert_eq!(err.status(), Status::BadRequest);
        }
        assert_eq!(Error::HashNotFound.status(), Status::NotFound);
    }

    #[test]
    fn access_errors_are_distinct_from_business_errors() {
        assert_eq!(Error::AuthenticationRequired.status(), Status::Unauthorized);
        assert_eq!(
            Error::PermissionDenied("admins only".into()).status(),
            Status::Forbidden
        );
    }

    #[test]
    fn kinds_are_stable() {
        assert_eq!(Error::DuplicateVote.kind(), "duplicate_vote");
        assert_eq!(Error::not_found("Vote 1".into()).kind(), "not_found");
        assert_eq!(
            Error::Status(Status::TooManyRequests, String::new()).kind(),
            "too_many_requests"
        );
    }
}
