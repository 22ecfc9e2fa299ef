//! Health check handler.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use sysinfo::{ProcessesToUpdate, System};
use tracing::warn;
use utoipa::ToSchema;

use crate::state::AppState;

const DATABASE_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Process memory usage in bytes.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MemoryUsage {
    pub rss: u64,
    pub virtual_memory: u64,
}

/// Health check response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Service status.
    pub status: String,
    /// Current timestamp.
    pub timestamp: DateTime<Utc>,
    /// Service version.
    pub version: String,
    /// Seconds since the server started.
    pub uptime: f64,
    pub memory: MemoryUsage,
    /// Database connection status.
    pub database: String,
    pub environment: String,
}

/// Body returned with HTTP 503.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UnhealthyResponse {
    pub status: String,
    pub error: String,
}

/// Health check endpoint (includes database check when one is configured).
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 503, description = "Database unreachable", body = UnhealthyResponse)
    )
)]
pub async fn health_check(State(state): State<Arc<AppState>>) -> Response {
    let database = match &state.pool {
        Some(pool) => {
            let probe = sqlx::query("SELECT 1").fetch_one(pool);
            match tokio::time::timeout(DATABASE_PROBE_TIMEOUT, probe).await {
                Ok(Ok(_)) => "connected".to_string(),
                Ok(Err(e)) => return unhealthy(e.to_string()),
                Err(_) => return unhealthy("database probe timed out".to_string()),
            }
        }
        None => "not_configured".to_string(),
    };

    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime: state.uptime().as_secs_f64(),
        memory: process_memory(),
        database,
        environment: state.environment.clone(),
    })
    .into_response()
}

fn unhealthy(error: String) -> Response {
    warn!(error = %error, "Health check failed");
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(UnhealthyResponse {
            status: "unhealthy".to_string(),
            error,
        }),
    )
        .into_response()
}

fn process_memory() -> MemoryUsage {
    let Ok(pid) = sysinfo::get_current_pid() else {
        return MemoryUsage::default();
    };

    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);

    system
        .process(pid)
        .map(|process| MemoryUsage {
            rss: process.memory(),
            virtual_memory: process.virtual_memory(),
        })
        .unwrap_or_default()
}
