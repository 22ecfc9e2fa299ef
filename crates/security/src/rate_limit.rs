//! Fixed-window rate limiting keyed by an arbitrary identifier.

use chrono::{DateTime, TimeDelta, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

/// Admission state for one identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitRecord {
    pub count: u32,
    pub reset_time: DateTime<Utc>,
}

impl RateLimitRecord {
    fn fresh(now: DateTime<Utc>, window: TimeDelta) -> Self {
        Self {
            count: 1,
            reset_time: now
                .checked_add_signed(window)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }
}

/// Fixed-window limiter.
///
/// The first request for an identifier opens a window ending `window` later.
/// Requests inside the window are admitted while `count < max_requests`.
/// Once `now` passes the window end the next request opens a new window.
#[derive(Debug, Default)]
pub struct RateLimiter {
    records: DashMap<String, RateLimitRecord>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check and count one request for `identifier` at time `now`.
    pub fn check(
        &self,
        identifier: &str,
        max_requests: u32,
        window: Duration,
        now: DateTime<Utc>,
    ) -> bool {
        if max_requests == 0 {
            return false;
        }

        let window = TimeDelta::from_std(window).unwrap_or(TimeDelta::MAX);

        match self.records.entry(identifier.to_string()) {
            Entry::Occupied(mut entry) if now <= entry.get().reset_time => {
                let record = entry.get_mut();
                if record.count >= max_requests {
                    debug!(identifier, count = record.count, "Rate limit exceeded");
                    false
                } else {
                    record.count += 1;
                    true
                }
            }
            Entry::Occupied(mut entry) => {
                entry.insert(RateLimitRecord::fresh(now, window));
                true
            }
            Entry::Vacant(entry) => {
                entry.insert(RateLimitRecord::fresh(now, window));
                true
            }
        }
    }

    /// Current record for an identifier, if any.
    pub fn record(&self, identifier: &str) -> Option<RateLimitRecord> {
        self.records.get(identifier).map(|r| r.clone())
    }

    /// Drop records whose window has ended. Returns how many were removed.
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        let before = self.records.len();
        self.records.retain(|_, record| now <= record.reset_time);
        before - self.records.len()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_secs(60);

    #[test]
    fn test_denies_after_max_requests() {
        let limiter = RateLimiter::new();
        let now = Utc::now();

        for i in 0..5 {
            assert!(limiter.check("sensor_a", 5, WINDOW, now), "call {} denied", i + 1);
        }
        assert!(!limiter.check("sensor_a", 5, WINDOW, now));
        assert!(!limiter.check("sensor_a", 5, WINDOW, now));
        assert_eq!(limiter.record("sensor_a").unwrap().count, 5);
    }

    #[test]
    fn test_window_resets_after_expiry() {
        let limiter = RateLimiter::new();
        let start = Utc::now();

        for _ in 0..3 {
            assert!(limiter.check("k", 3, WINDOW, start));
        }
        assert!(!limiter.check("k", 3, WINDOW, start + TimeDelta::seconds(60)));

        let later = start + TimeDelta::seconds(60) + TimeDelta::milliseconds(1);
        assert!(limiter.check("k", 3, WINDOW, later));
        assert_eq!(limiter.record("k").unwrap().count, 1);
    }

    #[test]
    fn test_identifiers_are_independent() {
        let limiter = RateLimiter::new();
        let now = Utc::now();

        assert!(limiter.check("a", 1, WINDOW, now));
        assert!(!limiter.check("a", 1, WINDOW, now));
        assert!(limiter.check("b", 1, WINDOW, now));
    }

    #[test]
    fn test_zero_limit_denies_everything() {
        let limiter = RateLimiter::new();
        assert!(!limiter.check("x", 0, WINDOW, Utc::now()));
        assert!(limiter.is_empty());
    }

    #[test]
    fn test_sweep_removes_only_expired() {
        let limiter = RateLimiter::new();
        let now = Utc::now();

        limiter.check("old", 10, Duration::from_secs(1), now);
        limiter.check("new", 10, Duration::from_secs(600), now);

        let removed = limiter.sweep_expired(now + TimeDelta::seconds(5));
        assert_eq!(removed, 1);
        assert!(limiter.record("old").is_none());
        assert!(limiter.record("new").is_some());
    }
}
