//! Audit log handlers.

use axum::extract::{Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use security::{AuditActor, AuditFilter, AuditLogEntry};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

const MAX_LIMIT: usize = 1000;

/// Query parameters for listing audit entries.
#[derive(Debug, Deserialize, IntoParams)]
pub struct AuditQuery {
    /// Maximum results (default 50, max 1000).
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Entries to skip.
    #[serde(default)]
    pub offset: usize,
    /// Only entries with this action, e.g. `login_failed`.
    pub action: Option<String>,
}

fn default_limit() -> usize {
    50
}

/// Audit entry response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AuditEntryResponse {
    pub timestamp: DateTime<Utc>,
    pub action: String,
    /// `authenticated_user` or `anonymous`.
    pub user: String,
    #[schema(value_type = Object)]
    pub details: serde_json::Value,
}

impl From<AuditLogEntry> for AuditEntryResponse {
    fn from(entry: AuditLogEntry) -> Self {
        let user = match entry.user {
            AuditActor::AuthenticatedUser => "authenticated_user",
            AuditActor::Anonymous => "anonymous",
        };
        Self {
            timestamp: entry.timestamp,
            action: entry.action.to_string(),
            user: user.to_string(),
            details: entry.details,
        }
    }
}

/// List recent audit entries, newest first. Requires an open session.
#[utoipa::path(
    get,
    path = "/api/v1/audit",
    tag = "audit",
    params(AuditQuery),
    responses(
        (status = 200, description = "Audit entries", body = Vec<AuditEntryResponse>),
        (status = 401, description = "No active session")
    )
)]
pub async fn list_audit_logs(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AuditQuery>,
) -> ApiResult<Json<Vec<AuditEntryResponse>>> {
    if !state.security.is_authenticated() {
        return Err(ApiError::Unauthorized("No active session".to_string()));
    }

    let mut filter = AuditFilter::new()
        .limit(query.limit.min(MAX_LIMIT))
        .offset(query.offset);
    if let Some(action) = query.action.filter(|a| !a.trim().is_empty()) {
        filter = filter.action(action.trim());
    }

    let entries = state
        .security
        .query_audit_logs(&filter)
        .into_iter()
        .map(AuditEntryResponse::from)
        .collect();

    Ok(Json(entries))
}
