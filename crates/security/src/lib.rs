//! Security Services
//!
//! Session encryption, mock authentication, rate limiting, audit logging,
//! suspicious-reading detection and data anonymization.

pub mod audit;
pub mod cipher;
pub mod error;
pub mod privacy;
pub mod rate_limit;
pub mod service;
pub mod session;

pub use audit::{AuditAction, AuditActor, AuditFilter, AuditLog, AuditLogEntry};
pub use cipher::SessionCipher;
pub use error::{Result, SecurityError};
pub use privacy::{anonymize_data, hash_data, sanitize_input};
pub use rate_limit::{RateLimitRecord, RateLimiter};
pub use service::SecurityService;
pub use session::Session;
