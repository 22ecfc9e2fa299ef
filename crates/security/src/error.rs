//! Error types for the security services.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SecurityError {
    #[error("Invalid session key: {0}")]
    InvalidKey(String),

    #[error("Encryption failed")]
    Encryption,

    #[error("Decryption failed (wrong key or corrupted data)")]
    Decryption,

    #[error("Ciphertext is not valid base64: {0}")]
    Encoding(#[from] base64::DecodeError),

    #[error("Decrypted payload is not valid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("Session serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] ecoguard_core::Error),
}

pub type Result<T> = std::result::Result<T, SecurityError>;
