//! Prometheus scrape endpoint.

use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use std::sync::Arc;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Metrics in the Prometheus text exposition format.
#[utoipa::path(
    get,
    path = "/metrics",
    tag = "health",
    responses(
        (status = 200, description = "Prometheus metrics", body = String, content_type = "text/plain")
    )
)]
pub async fn metrics(State(state): State<Arc<AppState>>) -> ApiResult<Response> {
    state.refresh_active_sensors();

    let body = state
        .metrics
        .render()
        .map_err(|e| ApiError::Internal(format!("Failed to encode metrics: {}", e)))?;

    Ok(([(CONTENT_TYPE, state.metrics.content_type())], body).into_response())
}
