//! Error types for the EcoGuard core library.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid storage key: {key}")]
    InvalidKey { key: String },
}

pub type Result<T> = std::result::Result<T, Error>;
