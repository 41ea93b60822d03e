use chrono::{DateTime, Duration, DurationRound, Utc};
use rocket::form::FromFormField;
use serde::{Deserialize, Serialize};

/// Bucket size for voting timelines.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, FromFormField)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    #[field(value = "hour")]
    Hour,
    #[field(value = "day")]
    Day,
}

impl Default for Granularity {
    fn default() -> Self {
        Self::Hour
    }
}

impl Granularity {
    /// Truncate a timestamp to the start of its bucket (UTC).
    pub fn truncate(self, time: DateTime<Utc>) -> DateTime<Utc> {
        let bucket = match self {
            Self::Hour => Duration::hours(1),
            Self::Day => Duration::days(1),
        };
        // Truncation by a whole number of hours/days cannot overflow for real timestamps.
        time.duration_trunc(bucket).unwrap_or(time)
    }
}
