//! Data anonymization endpoint.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use security::AuditAction;
use serde_json::{json, Value};
use std::sync::Arc;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Strip identifiers from a record and coarsen its location.
#[utoipa::path(
    post,
    path = "/api/v1/anonymize",
    tag = "privacy",
    request_body(content_type = "application/json", description = "Arbitrary JSON object"),
    responses(
        (status = 200, description = "Anonymized record"),
        (status = 400, description = "Body is not a JSON object")
    )
)]
pub async fn anonymize(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(record) = payload?;
    if !record.is_object() {
        return Err(ApiError::BadRequest("Expected a JSON object".to_string()));
    }

    let anonymized = state.security.anonymize_data(&record);
    let removed = record
        .as_object()
        .map(|o| o.len())
        .unwrap_or_default()
        .saturating_sub(anonymized.as_object().map(|o| o.len()).unwrap_or_default());

    state.security.log_action(
        AuditAction::DataAnonymized,
        json!({ "fieldsRemoved": removed }),
    );

    Ok(Json(anonymized))
}
