//! Configuration management for EcoGuard Pro services.

use crate::{Error, Result};
use chrono::TimeDelta;
use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Deployment environment name (`development`, `production`, ...).
    pub environment: String,
    pub storage: StorageConfig,
    pub security: SecurityConfig,
    pub auth: AuthConfig,
    pub database: DatabaseConfig,
}

/// Where client-side state (session, profile) is persisted.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageConfig {
    /// Directory for the file store. `None` keeps everything in memory.
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct SecurityConfig {
    /// Base64-encoded 32-byte key for session encryption. When unset a random
    /// key is generated per process and stored sessions do not survive a restart.
    pub session_key: Option<String>,
    /// Simulated round-trip time of the authentication call.
    pub auth_latency: Duration,
    /// Lifetime of a freshly issued or refreshed session.
    pub session_ttl: TimeDelta,
    /// Capacity of the audit log ring buffer.
    pub max_audit_entries: usize,
    /// Requests allowed per sensor within `sensor_rate_window`.
    pub sensor_rate_limit: u32,
    pub sensor_rate_window: Duration,
    /// Inclusive range of plausible sensor values.
    pub reading_min: f64,
    pub reading_max: f64,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            session_key: None,
            auth_latency: Duration::from_millis(1000),
            session_ttl: TimeDelta::hours(24),
            max_audit_entries: 1000,
            sensor_rate_limit: 10,
            sensor_rate_window: Duration::from_secs(60),
            reading_min: 0.0,
            reading_max: 10_000.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Simulated round-trip time of profile sign-in/sign-up calls.
    pub latency: Duration,
    /// Organization assigned to demo profiles.
    pub default_organization: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            latency: Duration::from_millis(1000),
            default_organization: "EcoGuard Demo".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DatabaseConfig {
    /// Postgres URL probed by the health endpoint. Optional.
    pub url: Option<String>,
    pub max_connections: u32,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let max_audit_entries: usize = parse_var("ECOGUARD_MAX_AUDIT_ENTRIES", 1000);
        if max_audit_entries == 0 {
            return Err(Error::Config {
                message: "ECOGUARD_MAX_AUDIT_ENTRIES must be greater than zero".to_string(),
            });
        }

        let session_ttl = session_ttl_from_hours(parse_var("ECOGUARD_SESSION_TTL_HOURS", 24))?;
        let defaults = SecurityConfig::default();

        Ok(Self {
            environment: env::var("ECOGUARD_ENV")
                .or_else(|_| env::var("APP_ENV"))
                .unwrap_or_else(|_| "development".to_string()),
            storage: StorageConfig {
                dir: env::var("ECOGUARD_STORAGE_DIR").ok().map(PathBuf::from),
            },
            security: SecurityConfig {
                session_key: env::var("ECOGUARD_SESSION_KEY").ok(),
                auth_latency: Duration::from_millis(parse_var("ECOGUARD_AUTH_LATENCY_MS", 1000)),
                session_ttl,
                max_audit_entries,
                sensor_rate_limit: parse_var("ECOGUARD_SENSOR_RATE_LIMIT", 10),
                sensor_rate_window: Duration::from_secs(parse_var(
                    "ECOGUARD_SENSOR_RATE_WINDOW_SECS",
                    60,
                )),
                reading_min: parse_var("ECOGUARD_READING_MIN", defaults.reading_min),
                reading_max: parse_var("ECOGUARD_READING_MAX", defaults.reading_max),
            },
            auth: AuthConfig {
                latency: Duration::from_millis(parse_var("ECOGUARD_AUTH_LATENCY_MS", 1000)),
                default_organization: env::var("ECOGUARD_DEFAULT_ORGANIZATION")
                    .unwrap_or_else(|_| AuthConfig::default().default_organization),
            },
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").ok(),
                max_connections: parse_var("DATABASE_MAX_CONNECTIONS", 5),
            },
        })
    }

    /// Configuration for tests: in-memory storage, no simulated latency.
    pub fn test_config() -> Self {
        Self {
            environment: "test".to_string(),
            storage: StorageConfig::default(),
            security: SecurityConfig {
                auth_latency: Duration::ZERO,
                ..Default::default()
            },
            auth: AuthConfig {
                latency: Duration::ZERO,
                ..Default::default()
            },
            database: DatabaseConfig::default(),
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

/// Longest accepted session lifetime (one year).
const MAX_SESSION_TTL_HOURS: i64 = 24 * 365;

/// Session lifetime from `ECOGUARD_SESSION_TTL_HOURS`, between one hour and
/// [`MAX_SESSION_TTL_HOURS`].
fn session_ttl_from_hours(hours: i64) -> Result<TimeDelta> {
    match TimeDelta::try_hours(hours) {
        Some(ttl) if (1..=MAX_SESSION_TTL_HOURS).contains(&hours) => Ok(ttl),
        _ => Err(Error::Config {
            message: format!("ECOGUARD_SESSION_TTL_HOURS out of range: {}", hours),
        }),
    }
}

fn parse_var<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
