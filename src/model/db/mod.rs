//! DB-compatible (e.g. de/serialisable) types.
//!
//! The types in this module are serialised in a DB-friendly way, e.g.:
//!
//! - IDs and datetimes are serialised in MongoDB's own format.
//!
//! Each entity comes as a `*Core` holding its data, a `New*` alias used for insertion,
//! and a full type pairing the core with its unique ID.

pub mod audit_log;
pub mod candidate;
pub mod election;
pub mod election_event;
pub mod invitation;
pub mod user;
pub mod vote;
pub mod voter_profile;
