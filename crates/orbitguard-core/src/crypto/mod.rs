// ============================================
// File: crates/orbitguard-core/src/crypto/mod.rs
// ============================================
//! # Cryptography Module
//!
//! ## Creation Reason
//! Centralizes payload cryptography for the relay. Sensors seal each
//! telemetry record under a pre-shared key; the relay opens it to inspect
//! the contents before forwarding.
//!
//! ## Main Functionality
//!
//! ### Submodules
//! - [`keys`]: The pre-shared `SharedKey`
//! - [`payload`]: ChaCha20-Poly1305 sealing and the base64 wire form
//! - [`unwrapper`]: Record-level open/seal used by the pipeline and producers
//!
//! ## Cryptographic Design
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Sensor                                                     │
//! │   TelemetryRecord ─► JSON ─► ChaCha20-Poly1305 ─► base64    │
//! │                               (SharedKey, random nonce)     │
//! └─────────────────────────────────────────────────────────────┘
//!                              │ encrypted_data
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Relay                                                      │
//! │   base64 ─► open ──┬─► tag fails  ─► Decryption             │
//! │                    └─► JSON record ─► MalformedPayload?     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - ALL implementations use RustCrypto (audited)
//! - NEVER roll your own crypto
//! - The shared key implements Zeroize on drop
//!
//! ## Last Modified
//! v0.1.0 - Initial crypto implementation

pub mod keys;
pub mod payload;
pub mod unwrapper;

// Re-export primary types at module level
pub use keys::SharedKey;
pub use payload::{DefaultPayloadCrypto, PayloadCrypto};
pub use unwrapper::Unwrapper;

// ============================================
// Constants
// ============================================

/// Size of the shared ChaCha20-Poly1305 key in bytes.
pub const SHARED_KEY_SIZE: usize = 32;

/// Size of ChaCha20-Poly1305 nonce in bytes.
pub const CHACHA20_NONCE_SIZE: usize = 12;

/// Size of Poly1305 authentication tag in bytes.
pub const POLY1305_TAG_SIZE: usize = 16;
