//! Application state shared across handlers.

use anyhow::Context;
use auth::AuthService;
use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use ecoguard_core::types::SensorReading;
use ecoguard_core::{Clock, Config, FileStore, KeyValueStore, MemoryStore, SystemClock};
use security::SecurityService;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tracing::info;

use crate::metrics::Metrics;

/// A sensor counts as active while it has reported within this interval.
pub const SENSOR_ACTIVE_WINDOW_SECS: i64 = 300;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Session, rate limiting and audit facade.
    pub security: Arc<SecurityService>,
    /// User-profile sessions.
    pub auth: Arc<AuthService>,
    /// Prometheus metrics.
    pub metrics: Arc<Metrics>,
    /// Optional Postgres pool, probed by the health check.
    pub pool: Option<PgPool>,
    /// Broadcast channel for accepted sensor readings.
    pub readings_tx: broadcast::Sender<SensorReading>,
    /// Last report time per sensor.
    pub sensor_last_seen: Arc<DashMap<String, DateTime<Utc>>>,
    pub clock: Arc<dyn Clock>,
    pub environment: String,
    pub started_at: Instant,
}

impl AppState {
    /// Build the state from configuration.
    pub fn from_config(config: &Config, channel_capacity: usize) -> anyhow::Result<Self> {
        let storage: Arc<dyn KeyValueStore> = match &config.storage.dir {
            Some(dir) => {
                info!(dir = %dir.display(), "Using file-backed local storage");
                Arc::new(FileStore::open(dir).context("Failed to open storage directory")?)
            }
            None => {
                info!("Using in-memory local storage");
                Arc::new(MemoryStore::new())
            }
        };
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let security = SecurityService::new(config.security.clone(), storage.clone(), clock.clone())
            .context("Failed to initialise security service")?;
        let auth = AuthService::new(config.auth.clone(), storage, clock.clone());
        let metrics = Metrics::new().context("Failed to register metrics")?;

        let pool = match &config.database.url {
            Some(url) => Some(
                PgPoolOptions::new()
                    .max_connections(config.database.max_connections.max(1))
                    .acquire_timeout(Duration::from_secs(3))
                    .connect_lazy(url)
                    .context("Invalid DATABASE_URL")?,
            ),
            None => None,
        };

        Ok(Self::from_parts(
            Arc::new(security),
            Arc::new(auth),
            Arc::new(metrics),
            pool,
            clock,
            config.environment.clone(),
            channel_capacity,
        ))
    }

    /// Assemble state from already-built services.
    pub fn from_parts(
        security: Arc<SecurityService>,
        auth: Arc<AuthService>,
        metrics: Arc<Metrics>,
        pool: Option<PgPool>,
        clock: Arc<dyn Clock>,
        environment: String,
        channel_capacity: usize,
    ) -> Self {
        let (readings_tx, _) = broadcast::channel(channel_capacity.max(1));
        Self {
            security,
            auth,
            metrics,
            pool,
            readings_tx,
            sensor_last_seen: Arc::new(DashMap::new()),
            clock,
            environment,
            started_at: Instant::now(),
        }
    }

    /// Subscribe to accepted sensor readings.
    pub fn subscribe_readings(&self) -> broadcast::Receiver<SensorReading> {
        self.readings_tx.subscribe()
    }

    /// Publish an accepted reading. Returns the number of live subscribers.
    pub fn publish_reading(&self, reading: SensorReading) -> usize {
        self.readings_tx.send(reading).unwrap_or(0)
    }

    /// Note that a sensor reported and refresh the active-sensor gauge.
    pub fn mark_sensor_seen(&self, sensor_id: &str) {
        self.sensor_last_seen
            .insert(sensor_id.to_string(), self.clock.now());
        self.refresh_active_sensors();
    }

    /// Forget sensors that went quiet and update the gauge.
    pub fn refresh_active_sensors(&self) -> usize {
        let cutoff = self.clock.now() - TimeDelta::seconds(SENSOR_ACTIVE_WINDOW_SECS);
        self.sensor_last_seen.retain(|_, seen| *seen >= cutoff);
        let active = self.sensor_last_seen.len();
        self.metrics.active_sensors_total.set(active as i64);
        active
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }
}
