//! API Server
//!
//! HTTP and WebSocket surface for EcoGuard Pro.
//!
//! # Features
//!
//! - **Sessions**: login, refresh and logout through the security service
//! - **Sensor ingestion**: suspicious-reading screening and a live WebSocket feed
//! - **Monitoring**: Prometheus metrics for every matched route, plus `/health`
//! - **OpenAPI**: Auto-generated Swagger documentation
//!
//! # Example
//!
//! ```ignore
//! use api_server::{ApiServer, ServerConfig};
//! use ecoguard_core::Config;
//!
//! let server = ApiServer::new(ServerConfig::from_env(), &Config::from_env()?)?;
//! server.run().await?;
//! ```

pub mod error;
pub mod handlers;
pub mod metrics;
pub mod routes;
pub mod state;
pub mod websocket;

pub use error::ApiError;
pub use metrics::{track_metrics, Metrics};
pub use routes::create_router;
pub use state::AppState;

use anyhow::Context;
use axum::extract::DefaultBodyLimit;
use axum::http::{Method, Request};
use axum::Router;
use ecoguard_core::Config;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{DefaultOnResponse, TraceLayer};
use tracing::{debug, info, Level};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Enable CORS for all origins (development only).
    pub cors_permissive: bool,
    /// Buffered readings per WebSocket subscriber.
    pub ws_channel_capacity: usize,
    /// Interval between rate-limit and sensor-gauge sweeps.
    pub maintenance_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            cors_permissive: true,
            ws_channel_capacity: 1000,
            maintenance_interval: Duration::from_secs(60),
        }
    }
}

impl ServerConfig {
    /// Create from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("API_HOST").unwrap_or(defaults.host),
            // PORT first (container platforms), then API_PORT
            port: std::env::var("PORT")
                .or_else(|_| std::env::var("API_PORT"))
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            cors_permissive: std::env::var("CORS_PERMISSIVE")
                .map(|v| v == "true")
                .unwrap_or(defaults.cors_permissive),
            ws_channel_capacity: std::env::var("WS_CHANNEL_CAPACITY")
                .ok()
                .and_then(|c| c.parse().ok())
                .unwrap_or(defaults.ws_channel_capacity),
            maintenance_interval: std::env::var("MAINTENANCE_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.maintenance_interval),
        }
    }

    /// Get the socket address.
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid socket address {}:{}", self.host, self.port))
    }
}

/// The API server.
pub struct ApiServer {
    config: ServerConfig,
    state: Arc<AppState>,
}

impl ApiServer {
    /// Create a new API server from server and application configuration.
    pub fn new(config: ServerConfig, app_config: &Config) -> anyhow::Result<Self> {
        let state = AppState::from_config(app_config, config.ws_channel_capacity)?;
        Ok(Self::with_state(config, state))
    }

    /// Create a server around already-built state.
    pub fn with_state(config: ServerConfig, state: AppState) -> Self {
        Self {
            config,
            state: Arc::new(state),
        }
    }

    pub fn state(&self) -> Arc<AppState> {
        self.state.clone()
    }

    /// Build the router with tracing, body-limit and CORS layers.
    pub fn router(&self) -> Router {
        create_router(self.state.clone())
            .layer(
                TraceLayer::new_for_http()
                    .on_request(|request: &Request<_>, _span: &tracing::Span| {
                        tracing::info!(
                            method = %request.method(),
                            uri = %request.uri(),
                            "Incoming request"
                        );
                    })
                    .on_response(DefaultOnResponse::new().level(Level::DEBUG))
                    .on_failure(
                        |error: tower_http::classify::ServerErrorsFailureClass,
                         latency: Duration,
                         _span: &tracing::Span| {
                            tracing::error!(
                                error = %error,
                                latency_ms = latency.as_millis(),
                                "Request failed"
                            );
                        },
                    ),
            )
            .layer(DefaultBodyLimit::max(256 * 1024))
            .layer(if self.config.cors_permissive {
                CorsLayer::permissive()
            } else {
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH])
                    .allow_headers(Any)
            })
    }

    /// Run the server until Ctrl-C.
    pub async fn run(self) -> anyhow::Result<()> {
        let router = self.router();

        spawn_maintenance(self.state.clone(), self.config.maintenance_interval);

        let addr = self.config.socket_addr()?;
        info!(address = %addr, "Starting API server");

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("API server stopped");
        Ok(())
    }
}

/// Periodically drop expired rate-limit windows and quiet sensors.
pub fn spawn_maintenance(state: Arc<AppState>, interval: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let swept = state.security.sweep_rate_limits();
            let active = state.refresh_active_sensors();
            debug!(swept, active_sensors = active, "Maintenance sweep");
        }
    })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_socket_addr() {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ..Default::default()
        };
        assert_eq!(config.socket_addr().unwrap().port(), 8080);

        let bad = ServerConfig {
            host: "not a host".to_string(),
            ..Default::default()
        };
        assert!(bad.socket_addr().is_err());
    }
}
