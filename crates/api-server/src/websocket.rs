//! WebSocket feed of accepted sensor readings.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use ecoguard_core::types::SensorReading;
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use prometheus::IntGauge;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::state::AppState;

/// WebSocket message wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum WsMessage {
    /// Accepted sensor reading.
    Reading(SensorReading),
    /// Subscription confirmation.
    #[serde(rename_all = "camelCase")]
    Subscribed {
        channel: String,
        sensor_type: Option<String>,
    },
    /// Readings dropped because the client fell behind.
    Lagged { skipped: u64 },
    /// Error message.
    Error { code: String, message: String },
    Pong,
}

/// Client request.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action")]
pub enum WsRequest {
    /// Only forward readings of one sensor type; `None` forwards all.
    #[serde(rename = "filter", rename_all = "camelCase")]
    Filter { sensor_type: Option<String> },
    /// Ping for keepalive.
    #[serde(rename = "ping")]
    Ping,
}

/// Holds the connection gauge up for the lifetime of a socket.
struct ConnectionGuard(IntGauge);

impl ConnectionGuard {
    fn new(gauge: IntGauge) -> Self {
        gauge.inc();
        Self(gauge)
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.0.dec();
    }
}

/// WebSocket upgrade handler for the readings feed.
pub async fn ws_readings_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_readings_socket(socket, state))
}

async fn handle_readings_socket(socket: WebSocket, state: Arc<AppState>) {
    let _guard = ConnectionGuard::new(state.metrics.websocket_connections_active.clone());
    let (mut sender, mut receiver) = socket.split();
    let mut readings_rx = state.subscribe_readings();
    let mut sensor_type: Option<String> = None;

    info!("WebSocket client connected to readings feed");

    let subscribed = WsMessage::Subscribed {
        channel: "readings".to_string(),
        sensor_type: None,
    };
    if send(&mut sender, &subscribed).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            msg = receiver.next() => {
                let reply = match msg {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<WsRequest>(text.as_str()) {
                            Ok(WsRequest::Ping) => WsMessage::Pong,
                            Ok(WsRequest::Filter { sensor_type: filter }) => {
                                sensor_type = filter.map(|t| state.security.sanitize_input(&t));
                                WsMessage::Subscribed {
                                    channel: "readings".to_string(),
                                    sensor_type: sensor_type.clone(),
                                }
                            }
                            Err(e) => WsMessage::Error {
                                code: "INVALID_REQUEST".to_string(),
                                message: e.to_string(),
                            },
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        warn!(error = %e, "WebSocket error");
                        break;
                    }
                    Some(Ok(_)) => continue,
                };
                if send(&mut sender, &reply).await.is_err() {
                    break;
                }
            }
            update = readings_rx.recv() => {
                let msg = match update {
                    Ok(reading) => {
                        if sensor_type.as_ref().is_some_and(|t| *t != reading.sensor_type) {
                            continue;
                        }
                        WsMessage::Reading(reading)
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(skipped, "WebSocket client lagging behind readings feed");
                        WsMessage::Lagged { skipped }
                    }
                    Err(RecvError::Closed) => break,
                };
                if send(&mut sender, &msg).await.is_err() {
                    break;
                }
            }
        }
    }

    info!("WebSocket client disconnected from readings feed");
}

async fn send(
    sender: &mut SplitSink<WebSocket, Message>,
    msg: &WsMessage,
) -> Result<(), axum::Error> {
    match serde_json::to_string(msg) {
        Ok(json) => sender.send(Message::Text(json.into())).await,
        Err(e) => {
            warn!(error = %e, "Failed to serialize WebSocket message");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::IntGauge;

    #[test]
    fn test_ws_message_serialization() {
        let msg = WsMessage::Reading(SensorReading::new("s-1", "noise", 61.0));
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""type":"Reading""#));
        assert!(json.contains(r#""sensorId":"s-1""#));
    }

    #[test]
    fn test_ws_request_deserialization() {
        let request: WsRequest =
            serde_json::from_str(r#"{"action": "filter", "sensorType": "water_ph"}"#).unwrap();
        match request {
            WsRequest::Filter { sensor_type } => {
                assert_eq!(sensor_type.as_deref(), Some("water_ph"));
            }
            _ => panic!("Expected Filter"),
        }

        let ping: WsRequest = serde_json::from_str(r#"{"action": "ping"}"#).unwrap();
        assert!(matches!(ping, WsRequest::Ping));
    }

    #[test]
    fn test_subscribed_uses_camel_case() {
        let msg = WsMessage::Subscribed {
            channel: "readings".to_string(),
            sensor_type: Some("noise".to_string()),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""sensorType":"noise""#));
    }

    #[test]
    fn test_connection_guard_tracks_gauge() {
        let gauge = IntGauge::new("test_connections", "test").unwrap();
        {
            let _a = ConnectionGuard::new(gauge.clone());
            let _b = ConnectionGuard::new(gauge.clone());
            assert_eq!(gauge.get(), 2);
        }
        assert_eq!(gauge.get(), 0);
    }
}
