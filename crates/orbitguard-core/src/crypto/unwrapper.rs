// ============================================
// File: crates/orbitguard-core/src/crypto/unwrapper.rs
// ============================================
//! # Payload Unwrapper
//!
//! ## Creation Reason
//! Binds the shared key to the payload cipher and the record codec, so the
//! pipeline can go from an envelope's `encrypted_data` text to a
//! `TelemetryRecord` in one call, with failures already split into the
//! two outcomes that matter:
//!
//! ```text
//! encrypted_data ──► open_token ──┬─► Err(Decryption)        tag/base64 failure
//!                                 └─► decode_record ──┬─► Err(MalformedPayload)
//!                                                     └─► Ok(TelemetryRecord)
//! ```
//!
//! The sealing half exists for producers (sensor simulators, tests).
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

use crate::crypto::keys::SharedKey;
use crate::crypto::payload::{open_token, seal_token, DefaultPayloadCrypto};
use crate::error::Result;
use crate::protocol::codec::{decode_record, encode_record};
use crate::protocol::messages::{Envelope, TelemetryRecord};
use crate::protocol::signature::expected_signature;

/// Sender name used when a record carries no sensor id.
pub const UNKNOWN_SENDER: &str = "UNKNOWN";

/// Opens and seals telemetry records under one shared key.
#[derive(Debug, Clone)]
pub struct Unwrapper {
    key: SharedKey,
    crypto: DefaultPayloadCrypto,
}

impl Unwrapper {
    /// Creates an unwrapper for `key`.
    #[must_use]
    pub fn new(key: SharedKey) -> Self {
        Self {
            key,
            crypto: DefaultPayloadCrypto::new(),
        }
    }

    /// Opens `encrypted_payload` and parses the telemetry record inside.
    ///
    /// # Errors
    /// - `Decryption`: not base64, truncated, tampered or foreign key
    /// - `MalformedPayload`: authentic plaintext that is not a JSON object
    pub fn open(&self, encrypted_payload: &str) -> Result<TelemetryRecord> {
        let plaintext = open_token(&self.crypto, &self.key, encrypted_payload)?;
        decode_record(&plaintext)
    }

    /// Seals a record into `encrypted_data` text.
    ///
    /// # Errors
    /// `Encoding` or `Encryption` if the record cannot be sealed.
    pub fn seal(&self, record: &TelemetryRecord) -> Result<String> {
        self.seal_bytes(&encode_record(record)?)
    }

    /// Seals arbitrary plaintext. Useful for producing malformed payloads.
    ///
    /// # Errors
    /// `Encryption` if sealing fails.
    pub fn seal_bytes(&self, plaintext: &[u8]) -> Result<String> {
        seal_token(&self.crypto, &self.key, plaintext)
    }

    /// Builds a complete envelope for `record`, carrying the token a
    /// well-behaved sensor would attach.
    ///
    /// # Errors
    /// See [`Unwrapper::seal`].
    pub fn seal_envelope(&self, record: &TelemetryRecord) -> Result<Envelope> {
        let sender = record
            .sensor_id
            .clone()
            .unwrap_or_else(|| UNKNOWN_SENDER.to_string());
        Ok(Envelope::new(
            sender,
            record.timestamp.clone(),
            self.seal(record)?,
            expected_signature(record.sequence.unwrap_or(0)),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;

    fn unwrapper(byte: u8) -> Unwrapper {
        Unwrapper::new(SharedKey::from_bytes([byte; 32]))
    }

    #[test]
    fn test_open_sealed_record() {
        let u = unwrapper(1);
        let record = TelemetryRecord::new("SENSOR_A", 12)
            .with_temperature(-15.5)
            .with_levels(45.0, 88.0)
            .with_position(51.5, -0.12);

        let token = u.seal(&record).unwrap();
        assert_eq!(u.open(&token).unwrap(), record);
    }

    #[test]
    fn test_foreign_key_is_decryption_failure() {
        let token = unwrapper(1).seal(&TelemetryRecord::new("S", 1)).unwrap();
        let err = unwrapper(2).open(&token).unwrap_err();
        assert!(err.is_decryption_failure());
    }

    #[test]
    fn test_garbage_is_decryption_failure() {
        let u = unwrapper(1);
        assert!(matches!(u.open("not-a-token"), Err(CoreError::Decryption)));
        assert!(matches!(u.open(""), Err(CoreError::Decryption)));
    }

    #[test]
    fn test_authentic_garbage_is_malformed_payload() {
        let u = unwrapper(1);
        let token = u.seal_bytes(b"definitely not json").unwrap();
        assert!(u.open(&token).unwrap_err().is_malformed_payload());

        let token = u.seal_bytes(b"[1,2,3]").unwrap();
        assert!(u.open(&token).unwrap_err().is_malformed_payload());
    }

    #[test]
    fn test_seal_envelope_carries_expected_signature() {
        let u = unwrapper(1);
        let record = TelemetryRecord::new("SENSOR_B", 42).with_timestamp("2024-01-01T00:00:00Z");
        let env = u.seal_envelope(&record).unwrap();

        assert_eq!(env.sender, "SENSOR_B");
        assert_eq!(env.timestamp.as_deref(), Some("2024-01-01T00:00:00Z"));
        assert_eq!(env.signature_token, "SIG_000042");
        assert_eq!(u.open(&env.encrypted_payload).unwrap(), record);
    }

    #[test]
    fn test_seal_envelope_without_sensor_id() {
        let u = unwrapper(1);
        let env = u.seal_envelope(&TelemetryRecord::default()).unwrap();
        assert_eq!(env.sender, UNKNOWN_SENDER);
        assert_eq!(env.signature_token, "SIG_000000");
    }
}
