//! Data types, split by where they live.
//!
//! - [`db`]: documents as stored in MongoDB.
//! - [`api`]: request and response bodies.
//! - [`common`]: types shared by both.
//! - [`mongodb`]: collection plumbing and IDs.

pub mod api;
pub mod common;
pub mod db;
pub mod mongodb;
