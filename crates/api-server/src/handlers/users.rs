//! User profile handlers backed by the auth service.
//!
//! Profiles are shared core types, so these routes are left out of the
//! OpenAPI document.

use auth::{ProfileUpdate, SignUpRequest};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use ecoguard_core::types::{UserPreferences, UserProfile};
use serde::Deserialize;
use std::sync::Arc;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

pub async fn sign_in(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SignInRequest>, JsonRejection>,
) -> ApiResult<Json<UserProfile>> {
    let Json(request) = payload?;
    let profile = state.auth.sign_in(&request.email, &request.password).await?;
    Ok(Json(profile))
}

pub async fn sign_up(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SignUpRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<UserProfile>)> {
    let Json(request) = payload?;
    let request = SignUpRequest {
        first_name: state.security.sanitize_input(&request.first_name),
        last_name: state.security.sanitize_input(&request.last_name),
        organization: request
            .organization
            .as_deref()
            .map(|org| state.security.sanitize_input(org)),
        ..request
    };
    let profile = state.auth.sign_up(request).await?;
    Ok((StatusCode::CREATED, Json(profile)))
}

pub async fn sign_out(State(state): State<Arc<AppState>>) -> ApiResult<StatusCode> {
    state.auth.sign_out()?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn current_user(State(state): State<Arc<AppState>>) -> ApiResult<Json<UserProfile>> {
    state
        .auth
        .current_user()
        .map(Json)
        .ok_or_else(|| ApiError::Unauthorized("Not signed in".to_string()))
}

pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ProfileUpdate>, JsonRejection>,
) -> ApiResult<Json<UserProfile>> {
    let Json(update) = payload?;
    let sanitize = |field: Option<String>| field.map(|v| state.security.sanitize_input(&v));
    let update = ProfileUpdate {
        first_name: sanitize(update.first_name),
        last_name: sanitize(update.last_name),
        organization: sanitize(update.organization),
        avatar: update.avatar,
    };
    Ok(Json(state.auth.update_profile(update)?))
}

pub async fn update_preferences(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<UserPreferences>, JsonRejection>,
) -> ApiResult<Json<UserProfile>> {
    let Json(preferences) = payload?;
    Ok(Json(state.auth.update_preferences(preferences)?))
}
