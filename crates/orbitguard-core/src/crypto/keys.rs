// ============================================
// File: crates/orbitguard-core/src/crypto/keys.rs
// ============================================
//! # Shared Key
//!
//! ## Creation Reason
//! Sensors and the relay share one pre-shared symmetric key for the
//! lifetime of the deployment. This module gives it a type with the
//! right security properties.
//!
//! ## Main Functionality
//! - `SharedKey`: 32-byte ChaCha20-Poly1305 key, zeroed on drop
//! - Base64 import/export for configuration files
//!
//! ## ⚠️ Important Note for Next Developer
//! - Key rotation is out of scope; the key is loaded once at startup
//! - `Debug` is redacted; never log `as_bytes()` or `to_base64()`
//! - zeroize 1.3 has no `ZeroizeOnDrop` derive, so `Drop` is manual
//!
//! ## Last Modified
//! v0.1.0 - Initial key type

use std::fmt;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroize;

use super::SHARED_KEY_SIZE;
use crate::error::{CoreError, Result};

// ============================================
// SharedKey
// ============================================

/// Pre-shared symmetric key for payload sealing.
///
/// # Example
/// ```
/// use orbitguard_core::crypto::SharedKey;
///
/// let key = SharedKey::generate();
/// let restored = SharedKey::from_base64(&key.to_base64()).unwrap();
/// assert_eq!(key.as_bytes(), restored.as_bytes());
/// ```
#[derive(Clone)]
pub struct SharedKey([u8; SHARED_KEY_SIZE]);

impl SharedKey {
    /// Creates a key from raw bytes.
    #[must_use]
    pub fn from_bytes(bytes: [u8; SHARED_KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Creates a key from a slice.
    ///
    /// # Errors
    /// `InvalidKey` if the slice is not exactly 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != SHARED_KEY_SIZE {
            return Err(CoreError::invalid_key(format!(
                "expected {SHARED_KEY_SIZE} bytes, got {}",
                bytes.len()
            )));
        }
        let mut key = [0u8; SHARED_KEY_SIZE];
        key.copy_from_slice(bytes);
        Ok(Self(key))
    }

    /// Parses a base64-encoded key.
    ///
    /// # Errors
    /// `InvalidKey` if the text is not base64 or decodes to the wrong length.
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let mut decoded = BASE64
            .decode(encoded.trim())
            .map_err(|e| CoreError::invalid_key(format!("not base64: {e}")))?;
        let key = Self::from_slice(&decoded);
        decoded.zeroize();
        key
    }

    /// Generates a random key from the OS RNG.
    #[must_use]
    pub fn generate() -> Self {
        let mut key = [0u8; SHARED_KEY_SIZE];
        OsRng.fill_bytes(&mut key);
        Self(key)
    }

    /// Returns the raw key bytes.
    ///
    /// # Security Warning
    /// Do not log or persist the returned bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; SHARED_KEY_SIZE] {
        &self.0
    }

    /// Encodes the key as base64 for configuration files.
    #[must_use]
    pub fn to_base64(&self) -> String {
        BASE64.encode(self.0)
    }
}

impl Drop for SharedKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl fmt::Debug for SharedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedKey([REDACTED])")
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrong_length_rejected() {
        assert!(matches!(
            SharedKey::from_slice(&[0u8; 16]),
            Err(CoreError::InvalidKey { .. })
        ));
        let short = BASE64.encode([1u8; 31]);
        assert!(SharedKey::from_base64(&short).is_err());
    }

    #[test]
    fn test_not_base64_rejected() {
        assert!(SharedKey::from_base64("***not base64***").is_err());
    }

    #[test]
    fn test_base64_tolerates_whitespace() {
        let key = SharedKey::from_bytes([7u8; 32]);
        let text = format!("  {}\n", key.to_base64());
        assert_eq!(SharedKey::from_base64(&text).unwrap().as_bytes(), &[7u8; 32]);
    }

    #[test]
    fn test_generated_keys_differ() {
        assert_ne!(SharedKey::generate().as_bytes(), SharedKey::generate().as_bytes());
    }

    #[test]
    fn test_debug_is_redacted() {
        let key = SharedKey::from_bytes([0x42u8; 32]);
        let dbg = format!("{key:?}");
        assert!(dbg.contains("REDACTED"));
        assert!(!dbg.contains("42"));
    }
}
