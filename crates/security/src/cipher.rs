//! Symmetric encryption for persisted session state.
//!
//! Uses AES-256-GCM with a 12-byte random nonce prepended to the ciphertext.
//! The combined (nonce || ciphertext) is base64-encoded so it can be kept in
//! string-valued local storage.

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Key, Nonce};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::{Result, SecurityError};

/// AES-GCM nonce size (96 bits / 12 bytes as recommended).
const NONCE_SIZE: usize = 12;

/// AES-256 key length in bytes.
pub const KEY_SIZE: usize = 32;

/// Session cipher holding a single AES-256-GCM key.
#[derive(Clone)]
pub struct SessionCipher {
    cipher: Aes256Gcm,
}

impl SessionCipher {
    /// Create a cipher with a fresh random key that lives only as long as
    /// this value. Anything encrypted with it is unreadable after a restart.
    pub fn generate() -> Self {
        let key = Aes256Gcm::generate_key(OsRng);
        Self {
            cipher: Aes256Gcm::new(&key),
        }
    }

    /// Create a cipher from raw key bytes.
    pub fn from_bytes(key: &[u8]) -> Result<Self> {
        if key.len() != KEY_SIZE {
            return Err(SecurityError::InvalidKey(format!(
                "expected {} bytes, got {}",
                KEY_SIZE,
                key.len()
            )));
        }
        let key = Key::<Aes256Gcm>::from_slice(key);
        Ok(Self {
            cipher: Aes256Gcm::new(key),
        })
    }

    /// Create a cipher from a base64-encoded 32-byte key.
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let bytes = STANDARD
            .decode(encoded.trim())
            .map_err(|e| SecurityError::InvalidKey(e.to_string()))?;
        Self::from_bytes(&bytes)
    }

    /// Encrypts a plaintext string and returns a base64-encoded (nonce || ciphertext).
    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| SecurityError::Encryption)?;

        let mut combined = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        combined.extend_from_slice(&nonce);
        combined.extend_from_slice(&ciphertext);

        Ok(STANDARD.encode(combined))
    }

    /// Decrypts a base64-encoded (nonce || ciphertext) back to plaintext.
    pub fn decrypt(&self, encoded: &str) -> Result<String> {
        let combined = STANDARD.decode(encoded.trim())?;
        if combined.len() <= NONCE_SIZE {
            return Err(SecurityError::Decryption);
        }

        let (nonce_bytes, ciphertext) = combined.split_at(NONCE_SIZE);
        let nonce = Nonce::from_slice(nonce_bytes);

        let plaintext = self
            .cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| SecurityError::Decryption)?;

        Ok(String::from_utf8(plaintext)?)
    }
}

impl std::fmt::Debug for SessionCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCipher").finish_non_exhaustive()
    }
}
