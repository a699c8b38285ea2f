// ============================================
// File: crates/orbitguard-core/src/protocol/messages.rs
// ============================================
//! # Message Definitions
//!
//! ## Creation Reason
//! Defines the two message layers a sensor sends: the outer envelope that
//! travels in clear, and the telemetry record sealed inside it.
//!
//! ## Main Functionality
//! - `Envelope`: Outer wire message (sender, timestamp, sealed payload, signature token)
//! - `TelemetryRecord`: Decrypted sensor reading
//! - Wire field name constants
//!
//! ## Envelope Wire Format (JSON object)
//! ```text
//! {
//!   "sender":         "ARCTIC-SENSOR-01",         ← required, string
//!   "timestamp":      "2026-01-05T10:00:00",      ← optional, sender-claimed
//!   "encrypted_data": "<base64 nonce||ct||tag>",  ← required, string
//!   "signature":      "SIG_000042"                ← required, string
//! }
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Every envelope field is sender-claimed; nothing here is authenticated
//! - Unknown envelope fields are kept in `extra` so forwarding is lossless
//! - A `TelemetryRecord` must only be built by the unwrapper after the
//!   payload authenticated
//!
//! ## Last Modified
//! v0.1.0 - Initial message definitions

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ============================================
// Wire Field Names
// ============================================

/// Wire name of the sender identifier.
pub const FIELD_SENDER: &str = "sender";

/// Wire name of the sender-claimed timestamp.
pub const FIELD_TIMESTAMP: &str = "timestamp";

/// Wire name of the sealed payload.
pub const FIELD_ENCRYPTED_DATA: &str = "encrypted_data";

/// Wire name of the signature token.
pub const FIELD_SIGNATURE: &str = "signature";

// ============================================
// Envelope
// ============================================

/// Outer wire message received from a sensor.
///
/// Created by the codec on receipt and never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    /// Sender identifier (not authenticated by the transport).
    pub sender: String,
    /// Sender-claimed timestamp, not trusted for ordering.
    pub timestamp: Option<String>,
    /// Opaque sealed payload, textually encoded.
    pub encrypted_payload: String,
    /// Sender-claimed signature token.
    pub signature_token: String,
    /// Fields not interpreted by the relay, re-emitted verbatim.
    pub extra: Map<String, Value>,
}

impl Envelope {
    /// Creates an envelope with no extra fields.
    pub fn new(
        sender: impl Into<String>,
        timestamp: Option<String>,
        encrypted_payload: impl Into<String>,
        signature_token: impl Into<String>,
    ) -> Self {
        Self {
            sender: sender.into(),
            timestamp,
            encrypted_payload: encrypted_payload.into(),
            signature_token: signature_token.into(),
            extra: Map::new(),
        }
    }
}

// ============================================
// TelemetryRecord
// ============================================

/// Decrypted sensor reading.
///
/// Every field is optional on the wire, but a present field must carry the
/// right type: `sequence` is a non-negative integer, readings are numbers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    /// Sensor identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sensor_id: Option<String>,
    /// Monotonic counter the signature token is derived from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u64>,
    /// Sensor-side reading time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    /// Degrees Celsius.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Relative humidity, percent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub humidity: Option<f64>,
    /// Battery charge, percent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery: Option<f64>,
    /// Degrees north.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    /// Degrees east.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
}

impl TelemetryRecord {
    /// Starts a record for `sensor_id` at `sequence`.
    pub fn new(sensor_id: impl Into<String>, sequence: u64) -> Self {
        Self {
            sensor_id: Some(sensor_id.into()),
            sequence: Some(sequence),
            ..Self::default()
        }
    }

    /// Sets the temperature reading.
    #[must_use]
    pub fn with_temperature(mut self, celsius: f64) -> Self {
        self.temperature = Some(celsius);
        self
    }

    /// Sets humidity and battery readings.
    #[must_use]
    pub fn with_levels(mut self, humidity: f64, battery: f64) -> Self {
        self.humidity = Some(humidity);
        self.battery = Some(battery);
        self
    }

    /// Sets the position.
    #[must_use]
    pub fn with_position(mut self, latitude: f64, longitude: f64) -> Self {
        self.latitude = Some(latitude);
        self.longitude = Some(longitude);
        self
    }

    /// Sets the sensor-side timestamp.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = Some(timestamp.into());
        self
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_rejects_negative_sequence() {
        let result: Result<TelemetryRecord, _> =
            serde_json::from_str(r#"{"sensor_id":"S","sequence":-1}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_record_accepts_integer_readings() {
        let record: TelemetryRecord =
            serde_json::from_str(r#"{"temperature":-15,"humidity":40}"#).unwrap();
        assert_eq!(record.temperature, Some(-15.0));
        assert_eq!(record.sequence, None);
    }

    #[test]
    fn test_record_rejects_string_reading() {
        let result: Result<TelemetryRecord, _> =
            serde_json::from_str(r#"{"temperature":"hot"}"#);
        assert!(result.is_err());
    }
}
