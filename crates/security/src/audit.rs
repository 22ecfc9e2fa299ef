//! Audit logging for security-relevant actions.
//!
//! The log is an in-memory ring buffer: appends are O(1) and once the
//! capacity is exceeded the oldest entries are trimmed in bulk.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

/// Types of auditable actions.
///
/// Serialized as a plain snake_case string; unknown strings round-trip
/// through [`AuditAction::Custom`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum AuditAction {
    // Authentication
    LoginSuccess,
    LoginFailed,
    Logout,
    SessionRefreshed,
    SessionRefreshFailed,
    SessionExpired,

    // Sensor data
    SuspiciousActivity,
    RateLimitExceeded,

    // Data access
    DataAnonymized,
    ExportData,

    // Other
    Custom(String),
}

impl AuditAction {
    pub fn as_str(&self) -> &str {
        match self {
            AuditAction::LoginSuccess => "login_success",
            AuditAction::LoginFailed => "login_failed",
            AuditAction::Logout => "logout",
            AuditAction::SessionRefreshed => "session_refreshed",
            AuditAction::SessionRefreshFailed => "session_refresh_failed",
            AuditAction::SessionExpired => "session_expired",
            AuditAction::SuspiciousActivity => "suspicious_activity",
            AuditAction::RateLimitExceeded => "rate_limit_exceeded",
            AuditAction::DataAnonymized => "data_anonymized",
            AuditAction::ExportData => "export_data",
            AuditAction::Custom(name) => name,
        }
    }
}

impl From<String> for AuditAction {
    fn from(value: String) -> Self {
        match value.as_str() {
            "login_success" => AuditAction::LoginSuccess,
            "login_failed" => AuditAction::LoginFailed,
            "logout" => AuditAction::Logout,
            "session_refreshed" => AuditAction::SessionRefreshed,
            "session_refresh_failed" => AuditAction::SessionRefreshFailed,
            "session_expired" => AuditAction::SessionExpired,
            "suspicious_activity" => AuditAction::SuspiciousActivity,
            "rate_limit_exceeded" => AuditAction::RateLimitExceeded,
            "data_anonymized" => AuditAction::DataAnonymized,
            "export_data" => AuditAction::ExportData,
            _ => AuditAction::Custom(value),
        }
    }
}

impl From<&str> for AuditAction {
    fn from(value: &str) -> Self {
        AuditAction::from(value.to_string())
    }
}

impl From<AuditAction> for String {
    fn from(action: AuditAction) -> Self {
        match action {
            AuditAction::Custom(name) => name,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who performed an audited action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditActor {
    AuthenticatedUser,
    Anonymous,
}

/// An audit log record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    /// When the action occurred.
    pub timestamp: DateTime<Utc>,
    /// Type of action.
    pub action: AuditAction,
    /// Whether a session was active at the time.
    pub user: AuditActor,
    /// Additional key-value details.
    pub details: serde_json::Value,
}

/// Filter for querying audit entries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditFilter {
    pub action: Option<AuditAction>,
    pub user: Option<AuditActor>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl AuditFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn action(mut self, action: impl Into<AuditAction>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn user(mut self, user: AuditActor) -> Self {
        self.user = Some(user);
        self
    }

    pub fn time_range(mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        self.from = Some(from);
        self.to = Some(to);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    fn matches(&self, entry: &AuditLogEntry) -> bool {
        if let Some(ref action) = self.action {
            if &entry.action != action {
                return false;
            }
        }
        if let Some(user) = self.user {
            if entry.user != user {
                return false;
            }
        }
        if let Some(from) = self.from {
            if entry.timestamp < from {
                return false;
            }
        }
        if let Some(to) = self.to {
            if entry.timestamp > to {
                return false;
            }
        }
        true
    }
}

/// Bounded, append-only audit log.
#[derive(Debug)]
pub struct AuditLog {
    entries: Mutex<VecDeque<AuditLogEntry>>,
    capacity: usize,
}

impl AuditLog {
    /// Create a log keeping at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append an entry, evicting the oldest ones once over capacity.
    pub fn append(&self, entry: AuditLogEntry) {
        let mut entries = self.entries.lock();
        entries.push_back(entry);
        if entries.len() > self.capacity {
            let excess = entries.len() - self.capacity;
            entries.drain(..excess);
        }
    }

    /// The `limit` most recent entries, newest first.
    pub fn recent(&self, limit: usize) -> Vec<AuditLogEntry> {
        self.query(&AuditFilter::new().limit(limit))
    }

    /// Entries matching `filter`, newest first.
    pub fn query(&self, filter: &AuditFilter) -> Vec<AuditLogEntry> {
        let mut matched: Vec<AuditLogEntry> = {
            let entries = self.entries.lock();
            entries
                .iter()
                .rev()
                .filter(|e| filter.matches(e))
                .cloned()
                .collect()
        };

        // Stable: equal timestamps stay newest-inserted first.
        matched.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

        let offset = filter.offset.unwrap_or(0);
        let limit = filter.limit.unwrap_or(usize::MAX);
        matched.into_iter().skip(offset).take(limit).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}
