use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of an election or election event.
///
/// There is no stored state field: the state is derived on every read from
/// `(is_active, start_time, end_time, now)`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElectionState {
    /// Active, but voting has not started yet.
    Scheduled,
    /// Active and inside the voting window.
    Open,
    /// Past the voting window, or deactivated by an admin.
    Closed,
}

/// Anything with an admin-controlled activity flag and a voting window.
pub trait VotingWindow {
    fn start_time(&self) -> DateTime<Utc>;
    fn end_time(&self) -> DateTime<Utc>;
    fn is_active(&self) -> bool;

    /// The state at the given instant. Deactivation forces `Closed` regardless of time.
    fn state_at(&self, now: DateTime<Utc>) -> ElectionState {
        if !self.is_active() || now > self.end_time() {
            ElectionState::Closed
        } else if now < self.start_time() {
            ElectionState::Scheduled
        } else {
            ElectionState::Open
        }
    }

    /// Is voting allowed at the given instant?
    fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        self.state_at(now) == ElectionState::Open
    }

    /// Is voting allowed right now?
    fn is_open(&self) -> bool {
        self.is_open_at(Utc::now())
    }

    /// Has the voting window elapsed, regardless of the activity flag?
    fn has_ended_at(&self, now: DateTime<Utc>) -> bool {
        now > self.end_time()
    }
}
