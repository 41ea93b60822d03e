//! The vote ledger: casting, verification, moderation, and tallying.
//!
//! Every write here runs in a MongoDB transaction, and every aggregate read in a
//! snapshot session. Uniqueness is enforced by the `(voter_id, election_id)` index
//! on `votes`; the pre-checks only produce friendlier errors.

mod cast;
mod eligibility;
mod moderation;
pub mod tally;
mod verify;

pub use cast::{cast_vote, record_vote, CastOutcome, Caster};
pub use eligibility::{is_eligible, profile_covers};
pub use moderation::set_verification;
pub use verify::verify_receipt;
