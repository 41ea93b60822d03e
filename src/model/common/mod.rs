//! Domain types shared between the DB and API representations.

pub mod audit;
pub mod granularity;
pub mod role;
pub mod window;
