//! Security service facade.
//!
//! [`SecurityService`] is constructed once at process start and shared by
//! reference (usually inside an `Arc`) with everything that needs it.

use chrono::{DateTime, Utc};
use ecoguard_core::config::SecurityConfig;
use ecoguard_core::storage::SESSION_STORAGE_KEY;
use ecoguard_core::types::SensorReading;
use ecoguard_core::{Clock, KeyValueStore};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::audit::{AuditAction, AuditActor, AuditFilter, AuditLog, AuditLogEntry};
use crate::cipher::SessionCipher;
use crate::error::Result;
use crate::privacy;
use crate::rate_limit::RateLimiter;
use crate::session::Session;

/// The only credential pair the mock authenticator accepts.
pub const DEMO_USERNAME: &str = "admin";
pub const DEMO_PASSWORD: &str = "password";

/// Client-side security facade: session encryption, mock authentication,
/// rate limiting, audit logging and data anonymization.
pub struct SecurityService {
    config: SecurityConfig,
    cipher: SessionCipher,
    storage: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    session: Mutex<Option<Session>>,
    rate_limiter: RateLimiter,
    audit_log: AuditLog,
}

impl SecurityService {
    /// Create the service and load any persisted session.
    ///
    /// Uses the configured session key when present, otherwise a random key
    /// that lives as long as this instance.
    pub fn new(
        config: SecurityConfig,
        storage: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let cipher = match config.session_key.as_deref() {
            Some(key) => SessionCipher::from_base64(key)?,
            None => {
                debug!("No session key configured, using a process-lifetime key");
                SessionCipher::generate()
            }
        };
        Ok(Self::with_cipher(config, cipher, storage, clock))
    }

    /// Create the service around an existing cipher.
    pub fn with_cipher(
        config: SecurityConfig,
        cipher: SessionCipher,
        storage: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let audit_log = AuditLog::new(config.max_audit_entries);
        let service = Self {
            config,
            cipher,
            storage,
            clock,
            session: Mutex::new(None),
            rate_limiter: RateLimiter::new(),
            audit_log,
        };
        service.load_session();
        service
    }

    pub fn config(&self) -> &SecurityConfig {
        &self.config
    }

    // ── Encryption ──

    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        self.cipher.encrypt(plaintext)
    }

    pub fn decrypt(&self, ciphertext: &str) -> Result<String> {
        self.cipher.decrypt(ciphertext)
    }

    // ── Sessions ──

    /// Re-read the persisted session.
    ///
    /// A blob that cannot be decrypted or parsed, or one that has expired, is
    /// removed and the service ends up with no session.
    pub fn load_session(&self) {
        let stored = match self.storage.get(SESSION_STORAGE_KEY) {
            Ok(Some(blob)) => blob,
            Ok(None) => {
                *self.session.lock() = None;
                return;
            }
            Err(e) => {
                warn!(error = %e, "Failed to read stored session");
                *self.session.lock() = None;
                return;
            }
        };

        let session = match self
            .cipher
            .decrypt(&stored)
            .and_then(|plain| serde_json::from_str::<Session>(&plain).map_err(Into::into))
        {
            Ok(session) => session,
            Err(e) => {
                debug!(error = %e, "Discarding unreadable stored session");
                self.clear_session();
                return;
            }
        };

        let now = self.clock.now();
        if session.is_expired(now) {
            debug!(expired_at = %session.expires_at, "Stored session has expired");
            self.clear_session();
            self.log_action(
                AuditAction::SessionExpired,
                json!({ "expiredAt": session.expires_at }),
            );
            return;
        }

        *self.session.lock() = Some(session);
    }

    /// Check credentials after the simulated network round trip.
    ///
    /// On success a new session is issued, encrypted and persisted.
    pub async fn authenticate(&self, username: &str, password: &str) -> bool {
        if !self.config.auth_latency.is_zero() {
            tokio::time::sleep(self.config.auth_latency).await;
        }

        if username != DEMO_USERNAME || password != DEMO_PASSWORD {
            info!(username, "Authentication failed");
            self.log_action(AuditAction::LoginFailed, json!({ "username": username }));
            return false;
        }

        let persisted = {
            let mut current = self.session.lock();
            let session = Session::issue(self.clock.now(), self.config.session_ttl);
            match self.persist_session(&session) {
                Ok(()) => {
                    let expires_at = session.expires_at;
                    *current = Some(session);
                    Ok(expires_at)
                }
                Err(e) => {
                    self.clear_locked(&mut current);
                    Err(e)
                }
            }
        };

        let expires_at = match persisted {
            Ok(expires_at) => expires_at,
            Err(e) => {
                warn!(error = %e, "Failed to persist session");
                self.log_action(
                    AuditAction::LoginFailed,
                    json!({ "username": username, "error": e.to_string() }),
                );
                return false;
            }
        };

        info!(username, %expires_at, "Authenticated");
        self.log_action(
            AuditAction::LoginSuccess,
            json!({ "username": username, "expiresAt": expires_at }),
        );
        true
    }

    /// True iff a session token is held in memory.
    pub fn is_authenticated(&self) -> bool {
        self.session.lock().is_some()
    }

    /// Snapshot of the current session.
    pub fn current_session(&self) -> Option<Session> {
        self.session.lock().clone()
    }

    /// Exchange the refresh token for a new session token.
    ///
    /// Any failure clears the session completely. The session lock is held
    /// from snapshot to commit so a concurrent logout cannot be undone.
    pub async fn refresh_session(&self) -> bool {
        let outcome = {
            let mut current = self.session.lock();
            match current.clone().filter(|s| !s.refresh_token.is_empty()) {
                None => {
                    self.clear_locked(&mut current);
                    Err("no_refresh_token".to_string())
                }
                Some(mut session) => {
                    session.rotate(self.clock.now(), self.config.session_ttl);
                    match self.persist_session(&session) {
                        Ok(()) => {
                            let expires_at = session.expires_at;
                            *current = Some(session);
                            Ok(expires_at)
                        }
                        Err(e) => {
                            warn!(error = %e, "Session refresh failed, clearing session");
                            self.clear_locked(&mut current);
                            Err(e.to_string())
                        }
                    }
                }
            }
        };

        match outcome {
            Ok(expires_at) => {
                self.log_action(
                    AuditAction::SessionRefreshed,
                    json!({ "expiresAt": expires_at }),
                );
                true
            }
            Err(reason) => {
                debug!(reason = %reason, "Session not refreshed");
                self.log_action(AuditAction::SessionRefreshFailed, json!({ "reason": reason }));
                false
            }
        }
    }

    /// End the current session.
    pub fn logout(&self) {
        let was_authenticated = {
            let mut current = self.session.lock();
            let was_authenticated = current.is_some();
            self.clear_locked(&mut current);
            was_authenticated
        };
        if was_authenticated {
            self.log_action(AuditAction::Logout, json!({}));
        }
    }

    fn persist_session(&self, session: &Session) -> Result<()> {
        let plain = serde_json::to_string(session)?;
        let blob = self.cipher.encrypt(&plain)?;
        self.storage.set(SESSION_STORAGE_KEY, &blob)?;
        Ok(())
    }

    fn clear_session(&self) {
        let mut current = self.session.lock();
        self.clear_locked(&mut current);
    }

    /// Drop the session while the caller holds the session lock.
    fn clear_locked(&self, current: &mut Option<Session>) {
        *current = None;
        if let Err(e) = self.storage.remove(SESSION_STORAGE_KEY) {
            warn!(error = %e, "Failed to remove stored session");
        }
    }

    // ── Rate limiting ──

    /// Count a request for `identifier` and report whether it is admitted.
    pub fn check_rate_limit(&self, identifier: &str, max_requests: u32, window: Duration) -> bool {
        self.rate_limiter
            .check(identifier, max_requests, window, self.clock.now())
    }

    /// Drop rate-limit windows that have ended.
    pub fn sweep_rate_limits(&self) -> usize {
        self.rate_limiter.sweep_expired(self.clock.now())
    }

    // ── Audit log ──

    /// Append an entry stamped with the current time and actor.
    pub fn log_action(&self, action: impl Into<AuditAction>, details: Value) {
        let action = action.into();
        let user = if self.is_authenticated() {
            AuditActor::AuthenticatedUser
        } else {
            AuditActor::Anonymous
        };

        debug!(action = %action, user = ?user, "Audit");

        self.audit_log.append(AuditLogEntry {
            timestamp: self.clock.now(),
            action,
            user,
            details,
        });
    }

    /// The `limit` most recent entries, newest first.
    pub fn get_audit_logs(&self, limit: usize) -> Vec<AuditLogEntry> {
        self.audit_log.recent(limit)
    }

    pub fn query_audit_logs(&self, filter: &AuditFilter) -> Vec<AuditLogEntry> {
        self.audit_log.query(filter)
    }

    pub fn audit_log_len(&self) -> usize {
        self.audit_log.len()
    }

    // ── Sensor screening ──

    /// Flag a reading whose value is implausible or whose sensor is
    /// reporting faster than its rate limit allows.
    pub fn detect_suspicious_activity(&self, reading: &SensorReading) -> bool {
        let in_range = (self.config.reading_min..=self.config.reading_max).contains(&reading.value);
        if !in_range {
            warn!(
                sensor_id = %reading.sensor_id,
                value = reading.value,
                "Sensor value out of range"
            );
            self.log_action(
                AuditAction::SuspiciousActivity,
                json!({
                    "sensorId": reading.sensor_id,
                    "value": reading.value,
                    "reason": "value_out_of_range",
                }),
            );
            return true;
        }

        let key = format!("sensor_{}", reading.sensor_id);
        if !self.check_rate_limit(
            &key,
            self.config.sensor_rate_limit,
            self.config.sensor_rate_window,
        ) {
            warn!(sensor_id = %reading.sensor_id, "Sensor rate limit exceeded");
            self.log_action(
                AuditAction::RateLimitExceeded,
                json!({ "sensorId": reading.sensor_id }),
            );
            return true;
        }

        false
    }

    // ── Privacy ──

    /// See [`privacy::anonymize_data`].
    pub fn anonymize_data(&self, record: &Value) -> Value {
        privacy::anonymize_data(record)
    }

    pub fn sanitize_input(&self, input: &str) -> String {
        privacy::sanitize_input(input)
    }

    pub fn hash_data(&self, data: &str) -> String {
        privacy::hash_data(data)
    }

    /// Time the current session expires, if any.
    pub fn session_expires_at(&self) -> Option<DateTime<Utc>> {
        self.session.lock().as_ref().map(|s| s.expires_at)
    }
}

impl std::fmt::Debug for SecurityService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityService")
            .field("authenticated", &self.is_authenticated())
            .field("audit_entries", &self.audit_log.len())
            .field("rate_limited_identifiers", &self.rate_limiter.len())
            .finish()
    }
}
