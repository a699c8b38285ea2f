// ============================================
// File: crates/orbitguard-core/src/protocol/mod.rs
// ============================================
//! # Protocol Module
//!
//! ## Creation Reason
//! Defines the sensor-to-relay wire protocol: one JSON envelope per
//! connection, wrapping a sealed telemetry record.
//!
//! ## Main Functionality
//! - [`messages`]: `Envelope` and `TelemetryRecord` definitions
//! - [`codec`]: Envelope decoding/encoding, record (de)serialization
//! - [`signature`]: Sequence-derived signature tokens
//!
//! ## Message Flow
//! ```text
//! Sensor                               Relay                      Ground
//!   │  {sender, timestamp,               │                           │
//!   │   encrypted_data, signature}       │                           │
//!   │ ─────────────────────────────────► │  screen                   │
//!   │          (one per connection)      │ ────────────────────────► │
//!   │                                    │   same envelope, fresh    │
//!   │                                    │   connection, no reply    │
//! ```
//!
//! ## Last Modified
//! v0.1.0 - Initial protocol definitions

pub mod codec;
pub mod messages;
pub mod signature;

pub use codec::{decode_record, encode_record, EnvelopeCodec, DEFAULT_MAX_MESSAGE_SIZE};
pub use messages::{Envelope, TelemetryRecord};
pub use signature::{expected_signature, signature_matches, SIGNATURE_PREFIX};
