//! Session handlers backed by the security service.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;
use utoipa::ToSchema;

use crate::error::{ApiError, ApiResult, ErrorResponse};
use crate::state::AppState;

/// Login attempts allowed per username and window.
const LOGIN_ATTEMPTS: u32 = 5;
const LOGIN_WINDOW: Duration = Duration::from_secs(60);

/// Login request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Current session state. Tokens never leave the server.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatusResponse {
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl SessionStatusResponse {
    fn from_state(state: &AppState) -> Self {
        Self {
            authenticated: state.security.is_authenticated(),
            expires_at: state.security.session_expires_at(),
        }
    }
}

/// Authenticate and open a session.
#[utoipa::path(
    post,
    path = "/api/v1/session/login",
    tag = "session",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session opened", body = SessionStatusResponse),
        (status = 400, description = "Invalid request body", body = ErrorResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 429, description = "Too many attempts")
    )
)]
pub async fn login(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<Json<SessionStatusResponse>> {
    let Json(request) = payload?;
    if request.username.trim().is_empty() {
        return Err(ApiError::BadRequest("username is required".to_string()));
    }

    // Sanitized form keys the limiter and logs only; credentials are checked verbatim.
    let display_name = state.security.sanitize_input(&request.username);
    let limiter_key = format!("login_{}", display_name);
    if !state
        .security
        .check_rate_limit(&limiter_key, LOGIN_ATTEMPTS, LOGIN_WINDOW)
    {
        warn!(username = %display_name, "Login rate limit exceeded");
        state.metrics.record_alert("warning", "login_rate_limited");
        return Err(ApiError::RateLimited);
    }

    if !state
        .security
        .authenticate(&request.username, &request.password)
        .await
    {
        return Err(ApiError::Unauthorized("Invalid credentials".to_string()));
    }

    Ok(Json(SessionStatusResponse::from_state(&state)))
}

/// Rotate the access token and extend the session.
#[utoipa::path(
    post,
    path = "/api/v1/session/refresh",
    tag = "session",
    responses(
        (status = 200, description = "Session refreshed", body = SessionStatusResponse),
        (status = 401, description = "No session to refresh")
    )
)]
pub async fn refresh(State(state): State<Arc<AppState>>) -> ApiResult<Json<SessionStatusResponse>> {
    if !state.security.refresh_session().await {
        return Err(ApiError::Unauthorized("No active session".to_string()));
    }

    Ok(Json(SessionStatusResponse::from_state(&state)))
}

/// End the current session.
#[utoipa::path(
    post,
    path = "/api/v1/session/logout",
    tag = "session",
    responses(
        (status = 204, description = "Session closed")
    )
)]
pub async fn logout(State(state): State<Arc<AppState>>) -> StatusCode {
    state.security.logout();
    StatusCode::NO_CONTENT
}

/// Report whether a session is open.
#[utoipa::path(
    get,
    path = "/api/v1/session",
    tag = "session",
    responses(
        (status = 200, description = "Session state", body = SessionStatusResponse)
    )
)]
pub async fn status(State(state): State<Arc<AppState>>) -> Json<SessionStatusResponse> {
    Json(SessionStatusResponse::from_state(&state))
}
