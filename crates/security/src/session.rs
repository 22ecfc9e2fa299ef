//! Session records and opaque token generation.

use chrono::{DateTime, TimeDelta, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Number of random bytes behind each token (hex-encoded to 64 chars).
const TOKEN_BYTES: usize = 32;

/// An authenticated client session.
///
/// Serialized as `{token, refreshToken, expiresAt}` with `expiresAt` in epoch
/// milliseconds, then encrypted before it touches storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub token: String,
    pub refresh_token: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Issue a session with fresh tokens, valid for `ttl` from `now`.
    pub fn issue(now: DateTime<Utc>, ttl: TimeDelta) -> Self {
        Self {
            token: generate_token(),
            refresh_token: generate_token(),
            expires_at: expiry(now, ttl),
        }
    }

    /// Replace the access token and push expiry out to `now + ttl`.
    /// The refresh token is kept.
    pub fn rotate(&mut self, now: DateTime<Utc>, ttl: TimeDelta) {
        self.token = generate_token();
        self.expires_at = expiry(now, ttl);
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Remaining validity, `None` once expired.
    pub fn remaining_validity(&self, now: DateTime<Utc>) -> Option<TimeDelta> {
        let remaining = self.expires_at - now;
        (remaining > TimeDelta::zero()).then_some(remaining)
    }
}

/// `now + ttl`, saturating at the latest representable time.
fn expiry(now: DateTime<Utc>, ttl: TimeDelta) -> DateTime<Utc> {
    now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Generate a random hex-encoded token.
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rng().fill(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_sets_expiry_and_distinct_tokens() {
        let now = Utc::now();
        let session = Session::issue(now, TimeDelta::hours(24));

        assert_eq!(session.token.len(), TOKEN_BYTES * 2);
        assert_ne!(session.token, session.refresh_token);
        assert_eq!(session.expires_at, now + TimeDelta::hours(24));
        assert!(!session.is_expired(now));
        assert!(session.is_expired(now + TimeDelta::hours(24)));
    }

    #[test]
    fn test_rotate_keeps_refresh_token() {
        let now = Utc::now();
        let mut session = Session::issue(now, TimeDelta::hours(1));
        let (old_token, refresh) = (session.token.clone(), session.refresh_token.clone());

        session.rotate(now + TimeDelta::minutes(30), TimeDelta::hours(1));

        assert_ne!(session.token, old_token);
        assert_eq!(session.refresh_token, refresh);
        assert_eq!(
            session.remaining_validity(now + TimeDelta::minutes(30)),
            Some(TimeDelta::hours(1))
        );
    }

    #[test]
    fn test_huge_ttl_saturates() {
        let now = Utc::now();
        let mut session = Session::issue(now, TimeDelta::MAX);
        assert_eq!(session.expires_at, DateTime::<Utc>::MAX_UTC);
        assert!(!session.is_expired(now));

        session.rotate(now, TimeDelta::MAX);
        assert_eq!(session.expires_at, DateTime::<Utc>::MAX_UTC);
    }

    #[test]
    fn test_wire_format() {
        let session = Session {
            token: "t".to_string(),
            refresh_token: "r".to_string(),
            expires_at: DateTime::from_timestamp_millis(1_700_000_000_123).unwrap(),
        };

        let json = serde_json::to_value(&session).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"token": "t", "refreshToken": "r", "expiresAt": 1_700_000_000_123i64})
        );
    }
}
