// ============================================
// File: crates/orbitguard-core/src/protocol/codec.rs
// ============================================
//! # Envelope Codec
//!
//! ## Creation Reason
//! Turns the raw bytes of one inbound connection into an [`Envelope`], and
//! an envelope back into bytes for sensors and test traffic.
//!
//! ## Parsing Strategy
//! 1. Check the buffer against the maximum message size
//! 2. Parse as JSON
//! 3. Require an object
//! 4. Take the required string fields in order: sender, encrypted_data, signature
//! 5. Keep everything else (including a non-string timestamp) in `extra`
//!
//! ## ⚠️ Important Note for Next Developer
//! - Every failure here is structural and must never panic
//! - Encoding is lossless in logical content for numbers that fit `i64`,
//!   `u64` or `f64`; key order is not preserved
//! - The relay forwards the received bytes, never a re-encoding
//!
//! ## Last Modified
//! v0.1.0 - Initial codec implementation

use serde_json::{Map, Value};

use crate::error::{CoreError, Result};
use crate::protocol::messages::{
    Envelope, TelemetryRecord, FIELD_ENCRYPTED_DATA, FIELD_SENDER, FIELD_SIGNATURE,
    FIELD_TIMESTAMP,
};

// ============================================
// Constants
// ============================================

/// Default upper bound on a single envelope, in bytes.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 4096;

// ============================================
// EnvelopeCodec
// ============================================

/// Codec for the JSON envelope wire format.
#[derive(Debug, Clone)]
pub struct EnvelopeCodec {
    max_message_size: usize,
}

impl EnvelopeCodec {
    /// Creates a codec accepting envelopes up to `max_message_size` bytes.
    #[must_use]
    pub const fn new(max_message_size: usize) -> Self {
        Self { max_message_size }
    }

    /// Returns the configured size limit.
    #[must_use]
    pub const fn max_message_size(&self) -> usize {
        self.max_message_size
    }

    /// Decodes one envelope.
    ///
    /// # Errors
    /// Any structural error (see [`CoreError::is_structural`]).
    pub fn decode(&self, buf: &[u8]) -> Result<Envelope> {
        if buf.len() > self.max_message_size {
            return Err(CoreError::MessageTooLarge {
                max: self.max_message_size,
                actual: buf.len(),
            });
        }

        let value: Value = serde_json::from_slice(buf).map_err(CoreError::invalid_json)?;
        let mut map = match value {
            Value::Object(map) => map,
            other => {
                return Err(CoreError::NotAnObject {
                    found: json_kind(&other),
                })
            }
        };

        let sender = take_string(&mut map, FIELD_SENDER)?;
        let encrypted_payload = take_string(&mut map, FIELD_ENCRYPTED_DATA)?;
        let signature_token = take_string(&mut map, FIELD_SIGNATURE)?;

        let timestamp = match map.remove(FIELD_TIMESTAMP) {
            Some(Value::String(ts)) => Some(ts),
            Some(other) => {
                map.insert(FIELD_TIMESTAMP.to_string(), other);
                None
            }
            None => None,
        };

        Ok(Envelope {
            sender,
            timestamp,
            encrypted_payload,
            signature_token,
            extra: map,
        })
    }

    /// Encodes an envelope as a JSON object.
    ///
    /// # Errors
    /// `Encoding` if JSON serialization fails.
    pub fn encode(&self, envelope: &Envelope) -> Result<Vec<u8>> {
        serde_json::to_vec(&Value::Object(envelope_to_map(envelope))).map_err(|e| {
            CoreError::Encoding {
                context: format!("envelope: {e}"),
            }
        })
    }
}

impl Default for EnvelopeCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_MESSAGE_SIZE)
    }
}

// ============================================
// Telemetry Record Encoding
// ============================================

/// Parses an authenticated plaintext into a telemetry record.
///
/// # Errors
/// `MalformedPayload` if the plaintext is not UTF-8 JSON of the right shape.
pub fn decode_record(plaintext: &[u8]) -> Result<TelemetryRecord> {
    let text = std::str::from_utf8(plaintext).map_err(CoreError::malformed_payload)?;
    let value: Value = serde_json::from_str(text).map_err(CoreError::malformed_payload)?;
    if !value.is_object() {
        return Err(CoreError::malformed_payload(format!(
            "expected an object, got {}",
            json_kind(&value)
        )));
    }
    serde_json::from_value(value).map_err(CoreError::malformed_payload)
}

/// Serializes a telemetry record into plaintext for sealing.
///
/// # Errors
/// `Encoding` if serialization fails.
pub fn encode_record(record: &TelemetryRecord) -> Result<Vec<u8>> {
    serde_json::to_vec(record).map_err(|e| CoreError::Encoding {
        context: format!("telemetry record: {e}"),
    })
}

// ============================================
// Helper Functions
// ============================================

fn envelope_to_map(envelope: &Envelope) -> Map<String, Value> {
    let mut map = envelope.extra.clone();
    map.insert(FIELD_SENDER.to_string(), Value::String(envelope.sender.clone()));
    if let Some(ts) = &envelope.timestamp {
        map.insert(FIELD_TIMESTAMP.to_string(), Value::String(ts.clone()));
    }
    map.insert(
        FIELD_ENCRYPTED_DATA.to_string(),
        Value::String(envelope.encrypted_payload.clone()),
    );
    map.insert(
        FIELD_SIGNATURE.to_string(),
        Value::String(envelope.signature_token.clone()),
    );
    map
}

fn take_string(map: &mut Map<String, Value>, field: &'static str) -> Result<String> {
    match map.remove(field) {
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err(CoreError::invalid_field(
            field,
            format!("must be a string, got {}", json_kind(&other)),
        )),
        None => Err(CoreError::MissingField { field }),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"{
        "sender": "ARCTIC-SENSOR-01",
        "timestamp": "2026-01-05T10:00:00",
        "encrypted_data": "AAAA",
        "signature": "SIG_000001"
    }"#;

    #[test]
    fn test_decode_valid_envelope() {
        let env = EnvelopeCodec::default().decode(VALID.as_bytes()).unwrap();
        assert_eq!(env.sender, "ARCTIC-SENSOR-01");
        assert_eq!(env.timestamp.as_deref(), Some("2026-01-05T10:00:00"));
        assert_eq!(env.encrypted_payload, "AAAA");
        assert_eq!(env.signature_token, "SIG_000001");
        assert!(env.extra.is_empty());
    }

    #[test]
    fn test_each_missing_field_is_rejected() {
        let codec = EnvelopeCodec::default();
        for field in ["sender", "encrypted_data", "signature"] {
            let mut value: Value = serde_json::from_str(VALID).unwrap();
            value.as_object_mut().unwrap().remove(field);
            let bytes = serde_json::to_vec(&value).unwrap();

            match codec.decode(&bytes) {
                Err(CoreError::MissingField { field: missing }) => assert_eq!(missing, field),
                other => panic!("expected MissingField({field}), got {other:?}"),
            }
        }
    }

    #[test]
    fn test_missing_timestamp_is_accepted() {
        let bytes = br#"{"sender":"S","encrypted_data":"x","signature":"SIG_000000"}"#;
        let env = EnvelopeCodec::default().decode(bytes).unwrap();
        assert!(env.timestamp.is_none());
    }

    #[test]
    fn test_non_object_payloads_are_structural() {
        let codec = EnvelopeCodec::default();
        for input in [r#""just a string""#, "42", "[1,2]", "null"] {
            let err = codec.decode(input.as_bytes()).unwrap_err();
            assert!(matches!(err, CoreError::NotAnObject { .. }), "{input}: {err:?}");
            assert!(err.is_structural());
        }
    }

    #[test]
    fn test_garbage_is_structural() {
        let err = EnvelopeCodec::default().decode(b"\xff\xfe not json").unwrap_err();
        assert!(matches!(err, CoreError::InvalidJson { .. }));
        assert!(err.is_structural());
    }

    #[test]
    fn test_wrong_type_is_structural() {
        let bytes = br#"{"sender":7,"encrypted_data":"x","signature":"SIG_000000"}"#;
        let err = EnvelopeCodec::default().decode(bytes).unwrap_err();
        assert!(matches!(err, CoreError::InvalidField { field: "sender", .. }));
    }

    #[test]
    fn test_oversized_is_rejected_before_parsing() {
        let codec = EnvelopeCodec::new(16);
        let err = codec.decode(VALID.as_bytes()).unwrap_err();
        assert!(matches!(err, CoreError::MessageTooLarge { max: 16, .. }));
    }

    #[test]
    fn test_encode_preserves_logical_content() {
        let input = r#"{"sender":"S","timestamp":12345,"encrypted_data":"x",
                        "signature":"SIG_000003","priority":"high"}"#;
        let codec = EnvelopeCodec::default();
        let env = codec.decode(input.as_bytes()).unwrap();

        // Non-string timestamp travels in `extra`.
        assert!(env.timestamp.is_none());
        assert_eq!(env.extra.len(), 2);

        let out = codec.encode(&env).unwrap();
        let original: Value = serde_json::from_str(input).unwrap();
        let forwarded: Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(original, forwarded);
        assert_eq!(codec.decode(&out).unwrap(), env);
    }

    #[test]
    fn test_decode_record_rejects_non_object() {
        let err = decode_record(b"[1,2,3]").unwrap_err();
        assert!(err.is_malformed_payload());
        let err = decode_record(&[0xff, 0x00]).unwrap_err();
        assert!(err.is_malformed_payload());
    }
}
