//! Error types for user authentication.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid email address")]
    InvalidEmail,

    #[error("Password must be at least {min} characters")]
    WeakPassword { min: usize },

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Not signed in")]
    NotAuthenticated,

    #[error("Profile serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] ecoguard_core::Error),
}

pub type Result<T> = std::result::Result<T, AuthError>;
