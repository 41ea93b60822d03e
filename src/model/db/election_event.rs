use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::{common::window::VotingWindow, mongodb::Id};

/// Core election event data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionEventCore {
    pub title: String,
    pub description: String,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub start_time: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub end_time: DateTime<Utc>,
    pub is_active: bool,
}

impl VotingWindow for ElectionEventCore {
    fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    fn end_time(&self) -> DateTime<Utc> {
        self.end_time
    }

    fn is_active(&self) -> bool {
        self.is_active
    }
}

/// An election event without an ID.
pub type NewElectionEvent = ElectionEventCore;

/// An election event from the database, with its unique ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElectionEvent {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub event: ElectionEventCore,
}

impl Deref for ElectionEvent {
    type Target = ElectionEventCore;

    fn deref(&self) -> &Self::Target {
        &self.event
    }
}

impl DerefMut for ElectionEvent {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.event
    }
}
