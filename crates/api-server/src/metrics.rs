//! Prometheus metrics and the HTTP instrumentation middleware.

use axum::extract::{MatchedPath, Request, State};
use axum::middleware::Next;
use axum::response::Response;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use std::sync::Arc;
use std::time::Instant;

/// Latency buckets in seconds.
const DURATION_BUCKETS: &[f64] = &[0.1, 0.3, 0.5, 0.7, 1.0, 3.0, 5.0, 7.0, 10.0];

/// Route label for requests that matched no route.
pub const UNMATCHED_ROUTE: &str = "unmatched";

/// Application metrics on a dedicated registry.
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub http_request_duration_seconds: HistogramVec,
    pub http_requests_total: IntCounterVec,
    pub active_sensors_total: IntGauge,
    pub sensor_readings_total: IntCounterVec,
    pub alerts_total: IntCounterVec,
    pub websocket_connections_active: IntGauge,
}

impl Metrics {
    /// Create and register all metrics.
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "http_request_duration_seconds",
                "Duration of HTTP requests in seconds",
            )
            .buckets(DURATION_BUCKETS.to_vec()),
            &["method", "route", "status_code"],
        )?;
        let http_requests_total = IntCounterVec::new(
            Opts::new("http_requests_total", "Total number of HTTP requests"),
            &["method", "route", "status_code"],
        )?;
        let active_sensors_total =
            IntGauge::new("active_sensors_total", "Number of sensors currently reporting")?;
        let sensor_readings_total = IntCounterVec::new(
            Opts::new("sensor_readings_total", "Total number of sensor readings received"),
            &["sensor_type", "status"],
        )?;
        let alerts_total = IntCounterVec::new(
            Opts::new("alerts_total", "Total number of alerts raised"),
            &["severity", "type"],
        )?;
        let websocket_connections_active = IntGauge::new(
            "websocket_connections_active",
            "Number of open WebSocket connections",
        )?;

        registry.register(Box::new(http_request_duration_seconds.clone()))?;
        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(active_sensors_total.clone()))?;
        registry.register(Box::new(sensor_readings_total.clone()))?;
        registry.register(Box::new(alerts_total.clone()))?;
        registry.register(Box::new(websocket_connections_active.clone()))?;

        Ok(Self {
            registry,
            http_request_duration_seconds,
            http_requests_total,
            active_sensors_total,
            sensor_readings_total,
            alerts_total,
            websocket_connections_active,
        })
    }

    /// Record one finished HTTP request.
    pub fn observe_request(&self, method: &str, route: &str, status_code: u16, seconds: f64) {
        let status = status_code.to_string();
        let labels = [method, route, status.as_str()];
        self.http_requests_total.with_label_values(&labels).inc();
        self.http_request_duration_seconds
            .with_label_values(&labels)
            .observe(seconds);
    }

    pub fn record_reading(&self, sensor_type: &str, status: &str) {
        self.sensor_readings_total
            .with_label_values(&[sensor_type, status])
            .inc();
    }

    pub fn record_alert(&self, severity: &str, alert_type: &str) {
        self.alerts_total
            .with_label_values(&[severity, alert_type])
            .inc();
    }

    /// Content type of [`Metrics::render`] output.
    pub fn content_type(&self) -> String {
        TextEncoder::new().format_type().to_string()
    }

    /// Render all metrics in the Prometheus text exposition format.
    pub fn render(&self) -> prometheus::Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// Middleware recording request count and latency per matched route.
pub async fn track_metrics(
    State(metrics): State<Arc<Metrics>>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_owned())
        .unwrap_or_else(|| UNMATCHED_ROUTE.to_owned());

    let response = next.run(request).await;

    metrics.observe_request(
        &method,
        &route,
        response.status().as_u16(),
        start.elapsed().as_secs_f64(),
    );

    response
}
