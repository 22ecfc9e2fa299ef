//! User Authentication
//!
//! Mock user-profile sessions persisted to local storage.

pub mod error;
pub mod service;

pub use error::{AuthError, Result};
pub use service::{AuthService, ProfileUpdate, SignUpRequest};
