mod principal;
mod token;

pub use principal::{has_capability, AdminPrincipal, Capability, Principal, VoterPrincipal};
pub use token::{AuthToken, AUTH_TOKEN_COOKIE};
