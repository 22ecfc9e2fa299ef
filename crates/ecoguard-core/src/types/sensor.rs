//! Sensor reading types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Geographic position of a sensor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
}

/// A single measurement reported by a sensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorReading {
    pub sensor_id: String,
    /// Measured quantity, e.g. `air_quality`, `water_ph`, `noise`.
    pub sensor_type: String,
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

impl SensorReading {
    pub fn new(sensor_id: impl Into<String>, sensor_type: impl Into<String>, value: f64) -> Self {
        Self {
            sensor_id: sensor_id.into(),
            sensor_type: sensor_type.into(),
            value,
            unit: None,
            timestamp: Utc::now(),
            location: None,
        }
    }

    pub fn with_location(mut self, lat: f64, lng: f64) -> Self {
        self.location = Some(Location { lat, lng });
        self
    }
}
