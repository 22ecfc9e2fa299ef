//! API route definitions.

use axum::extract::State;
use axum::http::{Method, Uri};
use axum::middleware;
use axum::routing::{get, post, put};
use axum::Router;
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::error::ApiError;
use crate::handlers::{audit, health, metrics, privacy, readings, session, users};
use crate::metrics::{track_metrics, UNMATCHED_ROUTE};
use crate::state::AppState;
use crate::websocket;

/// OpenAPI documentation.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "EcoGuard Pro API",
        version = "1.0.0",
        description = "Session, sensor ingestion and monitoring API for the EcoGuard Pro dashboard"
    ),
    paths(
        health::health_check,
        metrics::metrics,
        session::login,
        session::refresh,
        session::logout,
        session::status,
        readings::submit_reading,
        audit::list_audit_logs,
        privacy::anonymize,
    ),
    components(
        schemas(
            crate::error::ErrorResponse,
            health::HealthResponse,
            health::MemoryUsage,
            health::UnhealthyResponse,
            session::LoginRequest,
            session::SessionStatusResponse,
            readings::ReadingRequest,
            readings::ReadingResponse,
            readings::LocationDto,
            audit::AuditEntryResponse,
        )
    ),
    tags(
        (name = "health", description = "Health and metrics endpoints"),
        (name = "session", description = "Dashboard session management"),
        (name = "readings", description = "Sensor reading ingestion"),
        (name = "audit", description = "Security audit trail"),
        (name = "privacy", description = "Data anonymization"),
    )
)]
pub struct ApiDoc;

/// Create the API router.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health endpoints
        .route("/health", get(health::health_check))
        .route("/metrics", get(metrics::metrics))

        // Session endpoints
        .route("/api/v1/session", get(session::status))
        .route("/api/v1/session/login", post(session::login))
        .route("/api/v1/session/refresh", post(session::refresh))
        .route("/api/v1/session/logout", post(session::logout))

        // Sensor endpoints
        .route("/api/v1/readings", post(readings::submit_reading))

        // Audit and privacy endpoints
        .route("/api/v1/audit", get(audit::list_audit_logs))
        .route("/api/v1/anonymize", post(privacy::anonymize))

        // User profile endpoints
        .route("/api/v1/users/sign-in", post(users::sign_in))
        .route("/api/v1/users/sign-up", post(users::sign_up))
        .route("/api/v1/users/sign-out", post(users::sign_out))
        .route("/api/v1/users/me", get(users::current_user).patch(users::update_profile))
        .route("/api/v1/users/me/preferences", put(users::update_preferences))

        // WebSocket endpoints
        .route("/ws/readings", get(websocket::ws_readings_handler))

        // Swagger UI
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))

        // Instrument every matched route
        .route_layer(middleware::from_fn_with_state(
            state.metrics.clone(),
            track_metrics,
        ))

        .fallback(not_found)

        // Add state
        .with_state(state)
}

/// Fallback for unmatched requests, counted under the `unmatched` route.
async fn not_found(State(state): State<Arc<AppState>>, method: Method, uri: Uri) -> ApiError {
    state
        .metrics
        .observe_request(method.as_str(), UNMATCHED_ROUTE, 404, 0.0);
    ApiError::NotFound(uri.path().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_paths() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&String> = doc.paths.paths.keys().collect();
        assert!(paths.iter().any(|p| p.as_str() == "/health"));
        assert!(paths.iter().any(|p| p.as_str() == "/api/v1/readings"));
        assert!(paths.iter().any(|p| p.as_str() == "/api/v1/session/login"));
    }
}
