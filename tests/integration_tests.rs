//! Integration tests for component interactions.
//!
//! These tests drive the HTTP router end to end and exercise the services
//! together across storage backends.

use api_server::{ApiServer, AppState, ServerConfig};
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::TimeDelta;
use ecoguard_core::{Config, FileStore, KeyValueStore, ManualClock};
use http_body_util::BodyExt;
use security::SecurityService;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

/// Base64 of a 32-byte AES key.
const TEST_SESSION_KEY: &str = "MDEyMzQ1Njc4OWFiY2RlZjAxMjM0NTY3ODlhYmNkZWY=";

fn test_router() -> Router {
    let state = AppState::from_config(&Config::test_config(), 16).unwrap();
    ApiServer::with_state(ServerConfig::default(), state).router()
}

async fn send(router: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Vec<u8>) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, bytes.to_vec())
}

async fn send_json(router: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let (status, bytes) = send(router, method, uri, body).await;
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn metrics_text(router: &Router) -> String {
    let (status, bytes) = send(router, Method::GET, "/metrics", None).await;
    assert_eq!(status, StatusCode::OK);
    String::from_utf8(bytes).unwrap()
}

async fn login(router: &Router) {
    let (status, body) = send_json(
        router,
        Method::POST,
        "/api/v1/session/login",
        Some(json!({ "username": "admin", "password": "password" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["authenticated"], true);
}

/// Health reports healthy when no database is configured.
#[tokio::test]
async fn test_health_without_database() {
    let router = test_router();

    let (status, body) = send_json(&router, Method::GET, "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database"], "not_configured");
    assert_eq!(body["environment"], "test");
    assert!(body["uptime"].is_number());
    assert!(body["memory"]["rss"].is_number());
}

/// Requests are counted under their route template, misses under `unmatched`.
#[tokio::test]
async fn test_metrics_label_matched_and_unmatched_routes() {
    let router = test_router();

    send(&router, Method::GET, "/health", None).await;
    let (status, _) = send(&router, Method::GET, "/api-docs/openapi.json", None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&router, Method::GET, "/no/such/route", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let text = metrics_text(&router).await;
    assert!(text.contains(r#"http_requests_total{method="GET",route="/health",status_code="200"} 1"#));
    assert!(text.contains(
        r#"http_requests_total{method="GET",route="/api-docs/openapi.json",status_code="200"} 1"#
    ));
    assert!(text.contains(r#"route="unmatched",status_code="404""#));
    assert!(text.contains("http_request_duration_seconds_bucket"));
    assert!(text.contains("websocket_connections_active 0"));
}

/// Login, refresh and logout through the session routes.
#[tokio::test]
async fn test_session_lifecycle() {
    let router = test_router();

    let (status, _) = send_json(
        &router,
        Method::POST,
        "/api/v1/session/login",
        Some(json!({ "username": "admin", "password": "wrong" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send_json(&router, Method::POST, "/api/v1/session/refresh", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    login(&router).await;

    let (_, session) = send_json(&router, Method::GET, "/api/v1/session", None).await;
    assert_eq!(session["authenticated"], true);
    assert!(session["expiresAt"].is_string());

    let (status, refreshed) = send_json(&router, Method::POST, "/api/v1/session/refresh", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(refreshed["authenticated"], true);

    let (status, _) = send(&router, Method::POST, "/api/v1/session/logout", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, session) = send_json(&router, Method::GET, "/api/v1/session", None).await;
    assert_eq!(session["authenticated"], false);
    assert!(session.get("expiresAt").is_none());
}

/// Credentials are compared exactly as sent.
#[tokio::test]
async fn test_login_rejects_altered_usernames() {
    let router = test_router();

    for username in ["<admin>", "  admin  ", "adm<in"] {
        let (status, _) = send_json(
            &router,
            Method::POST,
            "/api/v1/session/login",
            Some(json!({ "username": username, "password": "password" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "username {:?}", username);
    }

    let (_, session) = send_json(&router, Method::GET, "/api/v1/session", None).await;
    assert_eq!(session["authenticated"], false);
}

/// Malformed bodies get the JSON error envelope.
#[tokio::test]
async fn test_malformed_json_returns_error_response() {
    let router = test_router();

    for uri in ["/api/v1/session/login", "/api/v1/readings", "/api/v1/users/sign-in"] {
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let response = router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", uri);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["code"], "INVALID_JSON");
        assert!(body["message"].is_string());
    }
}

/// The sixth login attempt within a minute is rejected before authentication.
#[tokio::test]
async fn test_login_rate_limited() {
    let router = test_router();
    let attempt = json!({ "username": "admin", "password": "guess" });

    for _ in 0..5 {
        let (status, _) =
            send_json(&router, Method::POST, "/api/v1/session/login", Some(attempt.clone())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    let (status, body) = send_json(&router, Method::POST, "/api/v1/session/login", Some(attempt)).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["code"], "RATE_LIMITED");
}

/// Accepted and suspicious readings update the sensor and alert metrics.
#[tokio::test]
async fn test_readings_screening_and_metrics() {
    let router = test_router();

    let (status, body) = send_json(
        &router,
        Method::POST,
        "/api/v1/readings",
        Some(json!({ "sensorId": "s-1", "sensorType": "air_quality", "value": 42.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "accepted");
    assert_eq!(body["deliveredTo"], 0);

    let (_, body) = send_json(
        &router,
        Method::POST,
        "/api/v1/readings",
        Some(json!({ "sensorId": "s-2", "sensorType": "air_quality", "value": 20000.0 })),
    )
    .await;
    assert_eq!(body["status"], "suspicious");

    let (status, _) = send_json(
        &router,
        Method::POST,
        "/api/v1/readings",
        Some(json!({ "sensorId": "  ", "sensorType": "noise", "value": 1.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let text = metrics_text(&router).await;
    assert!(text.contains(r#"sensor_readings_total{sensor_type="air_quality",status="accepted"} 1"#));
    assert!(text.contains(r#"sensor_readings_total{sensor_type="air_quality",status="suspicious"} 1"#));
    assert!(text.contains(r#"alerts_total{severity="warning",type="suspicious_reading"} 1"#));
    assert!(text.contains("active_sensors_total 2"));
}

/// A sensor reporting past its limit is flagged on the eleventh reading.
#[tokio::test]
async fn test_chatty_sensor_flagged() {
    let router = test_router();
    let reading = json!({ "sensorId": "chatty", "sensorType": "noise", "value": 55.0 });

    for _ in 0..10 {
        let (_, body) = send_json(&router, Method::POST, "/api/v1/readings", Some(reading.clone())).await;
        assert_eq!(body["status"], "accepted");
    }

    let (_, body) = send_json(&router, Method::POST, "/api/v1/readings", Some(reading)).await;
    assert_eq!(body["status"], "suspicious");
}

/// The audit trail needs a session and lists newest entries first.
#[tokio::test]
async fn test_audit_requires_session() {
    let router = test_router();

    let (status, _) = send_json(&router, Method::GET, "/api/v1/audit", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    send_json(
        &router,
        Method::POST,
        "/api/v1/session/login",
        Some(json!({ "username": "root", "password": "nope" })),
    )
    .await;
    login(&router).await;

    let (status, entries) = send_json(&router, Method::GET, "/api/v1/audit?limit=10", None).await;
    assert_eq!(status, StatusCode::OK);
    let entries = entries.as_array().unwrap();
    assert_eq!(entries[0]["action"], "login_success");
    assert_eq!(entries[0]["user"], "authenticated_user");
    assert_eq!(entries[1]["action"], "login_failed");
    assert_eq!(entries[1]["user"], "anonymous");

    let (_, filtered) =
        send_json(&router, Method::GET, "/api/v1/audit?action=login_failed", None).await;
    assert_eq!(filtered.as_array().unwrap().len(), 1);
}

/// Identifiers are removed and coordinates coarsened.
#[tokio::test]
async fn test_anonymize_endpoint() {
    let router = test_router();

    let (status, body) = send_json(
        &router,
        Method::POST,
        "/api/v1/anonymize",
        Some(json!({
            "location": { "lat": 37.774929, "lng": -122.419416 },
            "userId": "u1"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "location": { "lat": 37.77, "lng": -122.42 } }));

    let (status, _) = send_json(&router, Method::POST, "/api/v1/anonymize", Some(json!([1, 2]))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

/// Profile sign-in, edits and sign-out.
#[tokio::test]
async fn test_user_profile_flow() {
    let router = test_router();

    let (status, _) = send_json(&router, Method::GET, "/api/v1/users/me", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send_json(
        &router,
        Method::POST,
        "/api/v1/users/sign-in",
        Some(json!({ "email": "not-an-email", "password": "secret1" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, profile) = send_json(
        &router,
        Method::POST,
        "/api/v1/users/sign-in",
        Some(json!({ "email": "jane@example.com", "password": "secret1" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["email"], "jane@example.com");

    let (status, profile) = send_json(
        &router,
        Method::PATCH,
        "/api/v1/users/me",
        Some(json!({ "organization": "<b>River Trust</b>" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["organization"], "bRiver Trust/b");

    let (status, profile) = send_json(
        &router,
        Method::PUT,
        "/api/v1/users/me/preferences",
        Some(json!({
            "theme": "dark",
            "notifications": { "email": false, "push": true, "sms": false },
            "units": "imperial",
            "language": "de",
            "timezone": "Europe/Berlin"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["preferences"]["theme"], "dark");

    let (_, me) = send_json(&router, Method::GET, "/api/v1/users/me", None).await;
    assert_eq!(me["preferences"]["units"], "imperial");

    let (status, _) = send(&router, Method::POST, "/api/v1/users/sign-out", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send_json(&router, Method::GET, "/api/v1/users/me", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

/// The OpenAPI document is served.
#[tokio::test]
async fn test_openapi_document_served() {
    let router = test_router();

    let (status, doc) = send_json(&router, Method::GET, "/api-docs/openapi.json", None).await;

    assert_eq!(status, StatusCode::OK);
    assert!(doc["paths"]["/api/v1/readings"].is_object());
}

/// A session persisted to disk with a configured key survives a restart
/// until it expires.
#[tokio::test]
async fn test_session_survives_restart_until_expiry() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::test_config();
    config.security.session_key = Some(TEST_SESSION_KEY.to_string());
    let clock = Arc::new(ManualClock::default());

    let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(dir.path()).unwrap());
    let first = SecurityService::new(config.security.clone(), store, clock.clone()).unwrap();
    assert!(first.authenticate("admin", "password").await);
    drop(first);

    let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(dir.path()).unwrap());
    let second = SecurityService::new(config.security.clone(), store, clock.clone()).unwrap();
    assert!(second.is_authenticated());

    clock.advance(TimeDelta::hours(25));
    let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(dir.path()).unwrap());
    let third = SecurityService::new(config.security, store.clone(), clock).unwrap();
    assert!(!third.is_authenticated());
    assert_eq!(store.get(ecoguard_core::storage::SESSION_STORAGE_KEY).unwrap(), None);
}
