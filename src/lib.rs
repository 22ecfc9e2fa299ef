//! EcoGuard Pro: security, session and monitoring core.
//!
//! This is the root crate that provides benchmark and integration-test access
//! to the workspace crates. For actual functionality, use the individual
//! crates directly:
//!
//! - `ecoguard-core`: Shared types, local storage, clock, configuration
//! - `security`: Encrypted sessions, rate limiting, audit log, privacy helpers
//! - `auth`: Mock user-profile sessions
//! - `api-server`: HTTP/WebSocket API with Prometheus instrumentation

pub use api_server as server;
pub use auth;
pub use ecoguard_core as core;
pub use security;
