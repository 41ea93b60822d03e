//! Per-client throttling of public hash verification.
//!
//! This only curbs receipt brute-forcing; it plays no part in vote correctness and
//! its state is lost on restart.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use rocket::{
    http::Status,
    request::{FromRequest, Outcome},
    Request, State,
};

use crate::error::Error;
use crate::model::api::client::ClientAddress;

/// A fixed-window request counter keyed by client address.
pub struct VerifyThrottle {
    limit: u32,
    window: Duration,
    windows: Mutex<HashMap<IpAddr, Window>>,
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

impl VerifyThrottle {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Record a request from `client` at `now`, returning whether it is allowed.
    pub fn check_at(&self, client: IpAddr, now: Instant) -> bool {
        let mut windows = match self.windows.lock() {
            Ok(windows) => windows,
            // A panic mid-update leaves at worst a stale counter.
            Err(poisoned) => poisoned.into_inner(),
        };

        // Forget expired windows so the map does not grow without bound.
        let window_len = self.window;
        windows.retain(|_, w| now.duration_since(w.started) < window_len);

        let entry = windows.entry(client).or_insert(Window {
            started: now,
            count: 0,
        });
        if entry.count >= self.limit {
            return false;
        }
        entry.count += 1;
        true
    }

    pub fn check(&self, client: IpAddr) -> bool {
        self.check_at(client, Instant::now())
    }
}

/// Request guard that admits a request only if the caller is within its verification budget.
#[derive(Debug, Clone, Copy)]
pub struct Throttled;

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Throttled {
    type Error = Error;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        // Unwrap is safe as the throttle is always managed.
        let throttle = req.guard::<&State<VerifyThrottle>>().await.unwrap();
        // Requests without a known address share one budget.
        let client = ClientAddress::of(req)
            .0
            .unwrap_or(IpAddr::from([0, 0, 0, 0]));

        if throttle.check(client) {
            Outcome::Success(Throttled)
        } else {
            warn!("Throttled hash verification from {client}");
            Outcome::Failure((
                Status::TooManyRequests,
                Error::Status(
                    Status::TooManyRequests,
                    "Too many verification requests, try again later".to_string(),
                ),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(last: u8) -> IpAddr {
        IpAddr::from([10, 0, 0, last])
    }

    #[test]
    fn limits_requests_within_window() {
        let throttle = VerifyThrottle::new(3, Duration::from_secs(60));
        let now = Instant::now();
        assert!(throttle.check_at(ip(1), now));
        assert!(throttle.check_at(ip(1), now));
        assert!(throttle.check_at(ip(1), now));
        assert!(!throttle.check_at(ip(1), now));
    }

    #[test]
    fn clients_have_separate_budgets() {
        let throttle = VerifyThrottle::new(1, Duration::from_secs(60));
        let now = Instant::now();
        assert!(throttle.check_at(ip(1), now));
        assert!(!throttle.check_at(ip(1), now));
        assert!(throttle.check_at(ip(2), now));
    }

    #[test]
    fn budget_resets_after_window() {
        let throttle = VerifyThrottle::new(1, Duration::from_secs(60));
        let now = Instant::now();
        assert!(throttle.check_at(ip(1), now));
        assert!(!throttle.check_at(ip(1), now + Duration::from_secs(30)));
        assert!(throttle.check_at(ip(1), now + Duration::from_secs(61)));
    }
}
