// ============================================
// File: crates/orbitguard-core/src/lib.rs
// ============================================
//! # OrbitGuard Core - Protocol & Cryptography Library
//!
//! ## Creation Reason
//! Provides the envelope wire format and payload cryptography for the
//! OrbitGuard relay. Everything that must be byte-exact between sensors,
//! relay and ground station lives here.
//!
//! ## Main Functionality
//!
//! ### Protocol Module ([`protocol`])
//! - `Envelope` and `TelemetryRecord` definitions
//! - JSON envelope codec with structural validation
//! - `SIG_%06d` signature tokens
//!
//! ### Crypto Module ([`crypto`])
//! - `SharedKey` (pre-shared, zeroized on drop)
//! - Payload sealing (ChaCha20-Poly1305)
//! - `Unwrapper`: encrypted_data text ↔ `TelemetryRecord`
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    orbitguard-server                        │
//! │                           │                                 │
//! │        ┌──────────────────┼──────────────────────┐          │
//! │        ▼                  ▼                      ▼          │
//! │  orbitguard-core   orbitguard-transport   orbitguard-common │
//! │   You are here                                              │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - ALL cryptographic code uses audited RustCrypto implementations
//! - Nothing in this crate performs I/O
//! - Wire field names are fixed: sender, timestamp, encrypted_data, signature
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod crypto;
pub mod error;
pub mod protocol;

// Re-export commonly used items
pub use crypto::{DefaultPayloadCrypto, PayloadCrypto, SharedKey, Unwrapper};
pub use error::{CoreError, Result};
pub use protocol::{
    expected_signature, signature_matches, Envelope, EnvelopeCodec, TelemetryRecord,
};
