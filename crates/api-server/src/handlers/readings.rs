//! Sensor reading ingestion.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use ecoguard_core::types::{Location, SensorReading};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};
use utoipa::ToSchema;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

pub const STATUS_ACCEPTED: &str = "accepted";
pub const STATUS_SUSPICIOUS: &str = "suspicious";

/// Sensor coordinates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, ToSchema)]
pub struct LocationDto {
    pub lat: f64,
    pub lng: f64,
}

/// Reading submitted by a sensor.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReadingRequest {
    pub sensor_id: String,
    pub sensor_type: String,
    pub value: f64,
    pub unit: Option<String>,
    /// Defaults to the time of receipt.
    pub timestamp: Option<DateTime<Utc>>,
    pub location: Option<LocationDto>,
}

impl ReadingRequest {
    fn into_reading(self, state: &AppState) -> ApiResult<SensorReading> {
        let sensor_id = state.security.sanitize_input(&self.sensor_id);
        let sensor_type = state.security.sanitize_input(&self.sensor_type);
        if sensor_id.is_empty() {
            return Err(ApiError::Validation("sensorId is required".to_string()));
        }
        if sensor_type.is_empty() {
            return Err(ApiError::Validation("sensorType is required".to_string()));
        }

        Ok(SensorReading {
            sensor_id,
            sensor_type,
            value: self.value,
            unit: self.unit.map(|u| state.security.sanitize_input(&u)),
            timestamp: self.timestamp.unwrap_or_else(|| state.clock.now()),
            location: self.location.map(|l| Location {
                lat: l.lat,
                lng: l.lng,
            }),
        })
    }
}

/// Outcome of a submitted reading.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReadingResponse {
    pub sensor_id: String,
    /// `accepted` or `suspicious`.
    pub status: String,
    /// Live feed subscribers the reading was delivered to.
    pub delivered_to: usize,
}

/// Submit a sensor reading.
///
/// Suspicious readings are recorded and counted but not broadcast.
#[utoipa::path(
    post,
    path = "/api/v1/readings",
    tag = "readings",
    request_body = ReadingRequest,
    responses(
        (status = 200, description = "Reading processed", body = ReadingResponse),
        (status = 422, description = "Invalid reading")
    )
)]
pub async fn submit_reading(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ReadingRequest>, JsonRejection>,
) -> ApiResult<Json<ReadingResponse>> {
    let Json(request) = payload?;
    let reading = request.into_reading(&state)?;
    state.mark_sensor_seen(&reading.sensor_id);

    if state.security.detect_suspicious_activity(&reading) {
        state
            .metrics
            .record_reading(&reading.sensor_type, STATUS_SUSPICIOUS);
        state.metrics.record_alert("warning", "suspicious_reading");
        info!(
            sensor_id = %reading.sensor_id,
            sensor_type = %reading.sensor_type,
            "Suspicious reading rejected"
        );
        return Ok(Json(ReadingResponse {
            sensor_id: reading.sensor_id,
            status: STATUS_SUSPICIOUS.to_string(),
            delivered_to: 0,
        }));
    }

    state
        .metrics
        .record_reading(&reading.sensor_type, STATUS_ACCEPTED);
    let sensor_id = reading.sensor_id.clone();
    let delivered_to = state.publish_reading(reading);
    debug!(sensor_id = %sensor_id, delivered_to, "Reading accepted");

    Ok(Json(ReadingResponse {
        sensor_id,
        status: STATUS_ACCEPTED.to_string(),
        delivered_to,
    }))
}
