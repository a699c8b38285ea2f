// ============================================
// File: crates/orbitguard-core/src/crypto/payload.rs
// ============================================
//! # Payload Encryption
//!
//! ## Creation Reason
//! Provides authenticated encryption for the telemetry payload carried in
//! an envelope's `encrypted_data` field, using the ChaCha20-Poly1305 AEAD.
//!
//! ## Main Functionality
//! - `PayloadCrypto`: Trait for payload sealing/opening
//! - `DefaultPayloadCrypto`: Production implementation
//! - `seal_token` / `open_token`: base64 text form used on the wire
//!
//! ## Sealed Format
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │ Nonce (12 bytes)               │ ← random per message │
//! ├──────────────────────────────────────────────────────┤
//! │ Encrypted Payload (variable)   │ ← ChaCha20           │
//! │ └─ Poly1305 Tag (16 bytes)     │ ← Authentication tag │
//! └──────────────────────────────────────────────────────┘
//! wire text = base64(nonce || ciphertext || tag)
//! ```
//!
//! ## Security Properties
//! - **AEAD**: truncation, bit flips and foreign keys all fail the tag check
//! - **Random nonces**: there is no per-session counter under a long-lived
//!   shared key, so nonces are drawn from the OS RNG
//!
//! ## ⚠️ Important Note for Next Developer
//! - Never reuse a (key, nonce) pair - catastrophic security failure
//! - Every open failure maps to the detail-free `CoreError::Decryption`
//!
//! ## Last Modified
//! v0.1.0 - Initial payload crypto implementation

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use rand::rngs::OsRng;
use rand::RngCore;

use super::keys::SharedKey;
use super::{CHACHA20_NONCE_SIZE, POLY1305_TAG_SIZE};
use crate::error::{CoreError, Result};

// ============================================
// Constants
// ============================================

/// Bytes added to every sealed payload (nonce + tag).
pub const SEAL_OVERHEAD: usize = CHACHA20_NONCE_SIZE + POLY1305_TAG_SIZE;

// ============================================
// PayloadCrypto Trait
// ============================================

/// Trait for payload encryption operations.
///
/// # Purpose
/// Abstracts the cipher so tests and alternative suites can be swapped in.
pub trait PayloadCrypto: Send + Sync {
    /// Seals a plaintext, returning `nonce || ciphertext || tag`.
    ///
    /// # Errors
    /// - `Encryption`: If the cipher rejects the input
    fn seal(&self, key: &SharedKey, plaintext: &[u8]) -> Result<Vec<u8>>;

    /// Opens a sealed payload.
    ///
    /// # Errors
    /// - `Decryption`: If the payload is truncated, tampered or sealed under another key
    fn open(&self, key: &SharedKey, sealed: &[u8]) -> Result<Vec<u8>>;

    /// Returns the sealing overhead in bytes.
    fn overhead(&self) -> usize;
}

// ============================================
// DefaultPayloadCrypto
// ============================================

/// Default implementation using ChaCha20-Poly1305.
#[derive(Debug, Default, Clone)]
pub struct DefaultPayloadCrypto;

impl DefaultPayloadCrypto {
    /// Creates a new instance.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn random_nonce() -> [u8; CHACHA20_NONCE_SIZE] {
        let mut nonce = [0u8; CHACHA20_NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce);
        nonce
    }
}

impl PayloadCrypto for DefaultPayloadCrypto {
    fn seal(&self, key: &SharedKey, plaintext: &[u8]) -> Result<Vec<u8>> {
        let cipher = ChaCha20Poly1305::new_from_slice(key.as_bytes()).map_err(|_| {
            CoreError::Encryption {
                context: "Failed to create cipher".into(),
            }
        })?;
        let nonce = Self::random_nonce();

        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|_| CoreError::Encryption {
                context: "ChaCha20-Poly1305 encryption failed".into(),
            })?;

        let mut sealed = Vec::with_capacity(CHACHA20_NONCE_SIZE + ciphertext.len());
        sealed.extend_from_slice(&nonce);
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }

    fn open(&self, key: &SharedKey, sealed: &[u8]) -> Result<Vec<u8>> {
        if sealed.len() < SEAL_OVERHEAD {
            return Err(CoreError::Decryption);
        }

        let cipher =
            ChaCha20Poly1305::new_from_slice(key.as_bytes()).map_err(|_| CoreError::Decryption)?;
        let (nonce, ciphertext) = sealed.split_at(CHACHA20_NONCE_SIZE);

        cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| CoreError::Decryption)
    }

    fn overhead(&self) -> usize {
        SEAL_OVERHEAD
    }
}

// ============================================
// Text Form
// ============================================

/// Seals `plaintext` and encodes it as base64 wire text.
///
/// # Errors
/// `Encryption` if sealing fails.
pub fn seal_token(
    crypto: &impl PayloadCrypto,
    key: &SharedKey,
    plaintext: &[u8],
) -> Result<String> {
    Ok(BASE64.encode(crypto.seal(key, plaintext)?))
}

/// Decodes base64 wire text and opens it.
///
/// # Errors
/// `Decryption` if the text is not base64 or the payload fails authentication.
pub fn open_token(crypto: &impl PayloadCrypto, key: &SharedKey, token: &str) -> Result<Vec<u8>> {
    let sealed = BASE64
        .decode(token.trim())
        .map_err(|_| CoreError::Decryption)?;
    crypto.open(key, &sealed)
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> SharedKey {
        SharedKey::from_bytes([0x42u8; 32])
    }

    #[test]
    fn test_seal_open_roundtrip() {
        let crypto = DefaultPayloadCrypto::new();
        let plaintext = b"{\"temperature\":-15.2}";

        let sealed = crypto.seal(&test_key(), plaintext).unwrap();
        assert_eq!(sealed.len(), plaintext.len() + SEAL_OVERHEAD);

        let opened = crypto.open(&test_key(), &sealed).unwrap();
        assert_eq!(opened, plaintext);
    }

    #[test]
    fn test_nonces_are_fresh() {
        let crypto = DefaultPayloadCrypto::new();
        let a = crypto.seal(&test_key(), b"same").unwrap();
        let b = crypto.seal(&test_key(), b"same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_wrong_key_fails() {
        let crypto = DefaultPayloadCrypto::new();
        let sealed = crypto.seal(&test_key(), b"payload").unwrap();
        let other = SharedKey::from_bytes([0x43u8; 32]);
        assert!(matches!(crypto.open(&other, &sealed), Err(CoreError::Decryption)));
    }

    #[test]
    fn test_tampered_and_truncated_fail() {
        let crypto = DefaultPayloadCrypto::new();
        let mut sealed = crypto.seal(&test_key(), b"payload").unwrap();

        let truncated = &sealed[..sealed.len() - 1];
        assert!(matches!(crypto.open(&test_key(), truncated), Err(CoreError::Decryption)));

        let last = sealed.len() - 1;
        sealed[last] ^= 0x01;
        assert!(matches!(crypto.open(&test_key(), &sealed), Err(CoreError::Decryption)));

        assert!(matches!(crypto.open(&test_key(), &[0u8; 8]), Err(CoreError::Decryption)));
    }

    #[test]
    fn test_token_form() {
        let crypto = DefaultPayloadCrypto::new();
        let token = seal_token(&crypto, &test_key(), b"hello").unwrap();
        assert_eq!(open_token(&crypto, &test_key(), &token).unwrap(), b"hello");
        assert!(matches!(
            open_token(&crypto, &test_key(), "%%% not base64 %%%"),
            Err(CoreError::Decryption)
        ));
    }
}
