// ============================================
// File: crates/orbitguard-core/src/error.rs
// ============================================
//! # Core Error Types
//!
//! ## Creation Reason
//! Defines error types specific to envelope parsing and payload
//! cryptography in the OrbitGuard core crate.
//!
//! ## Error Categories
//! 1. **Structural Errors**: unframeable bytes, non-object JSON, missing or
//!    mistyped envelope fields. These all map to `INVALID_STRUCTURE`
//! 2. **Crypto Errors**: authentication failure (`DECRYPTION_FAILED`),
//!    key errors, sealing failure
//! 3. **Payload Errors**: authentic plaintext that is not a telemetry record
//!    (`MALFORMED_PAYLOAD`)
//!
//! ## ⚠️ Important Note for Next Developer
//! - NEVER include key material or plaintext in error messages
//! - `Decryption` deliberately carries no detail: a truncated token, a
//!   corrupted token and a foreign key must be indistinguishable to a peer
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use thiserror::Error;

// ============================================
// Result Type Alias
// ============================================

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

// ============================================
// CoreError
// ============================================

/// Core error types for envelope and payload operations.
#[derive(Error, Debug)]
pub enum CoreError {
    // ========================================
    // Structural Errors
    // ========================================

    /// Bytes are not a JSON document.
    #[error("Malformed envelope: invalid JSON: {reason}")]
    InvalidJson {
        /// Parser message
        reason: String,
    },

    /// JSON document is not an object.
    #[error("Malformed envelope: expected an object, got {found}")]
    NotAnObject {
        /// JSON kind that was received
        found: &'static str,
    },

    /// A required envelope field is absent.
    #[error("Malformed envelope: missing {field}")]
    MissingField {
        /// Wire name of the field
        field: &'static str,
    },

    /// A required envelope field has the wrong type.
    #[error("Malformed envelope: field {field} {reason}")]
    InvalidField {
        /// Wire name of the field
        field: &'static str,
        /// What's wrong with it
        reason: String,
    },

    /// Message could not be serialized.
    #[error("Encoding failed: {context}")]
    Encoding {
        /// What was being encoded
        context: String,
    },

    /// Message exceeds maximum allowed size.
    #[error("Message too large: max {max} bytes, got {actual}")]
    MessageTooLarge {
        /// Maximum allowed size
        max: usize,
        /// Actual size received
        actual: usize,
    },

    // ========================================
    // Cryptographic Errors
    // ========================================

    /// Payload failed authentication (truncated, corrupted or wrong key).
    #[error("Decryption failed: authentication error")]
    Decryption,

    /// Encryption operation failed.
    #[error("Encryption failed: {context}")]
    Encryption {
        /// What was being encrypted
        context: String,
    },

    /// Shared key material is unusable.
    #[error("Invalid key: {reason}")]
    InvalidKey {
        /// Why the key was rejected
        reason: String,
    },

    // ========================================
    // Payload Errors
    // ========================================

    /// Authentic plaintext is not a valid telemetry record.
    #[error("Malformed payload: {reason}")]
    MalformedPayload {
        /// What's wrong with the plaintext
        reason: String,
    },
}

impl CoreError {
    // ========================================
    // Convenience Constructors
    // ========================================

    /// Creates an `InvalidJson` error.
    pub fn invalid_json(reason: impl ToString) -> Self {
        Self::InvalidJson {
            reason: reason.to_string(),
        }
    }

    /// Creates an `InvalidField` error.
    pub fn invalid_field(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidField {
            field,
            reason: reason.into(),
        }
    }

    /// Creates a `MalformedPayload` error.
    pub fn malformed_payload(reason: impl ToString) -> Self {
        Self::MalformedPayload {
            reason: reason.to_string(),
        }
    }

    /// Creates an `InvalidKey` error.
    pub fn invalid_key(reason: impl Into<String>) -> Self {
        Self::InvalidKey {
            reason: reason.into(),
        }
    }

    // ========================================
    // Error Classification
    // ========================================

    /// Returns `true` for errors that mean the envelope itself is unusable.
    #[must_use]
    pub const fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::InvalidJson { .. }
                | Self::NotAnObject { .. }
                | Self::MissingField { .. }
                | Self::InvalidField { .. }
                | Self::MessageTooLarge { .. }
        )
    }

    /// Returns `true` if the payload failed authentication.
    #[must_use]
    pub const fn is_decryption_failure(&self) -> bool {
        matches!(self, Self::Decryption)
    }

    /// Returns `true` if the payload authenticated but did not parse.
    #[must_use]
    pub const fn is_malformed_payload(&self) -> bool {
        matches!(self, Self::MalformedPayload { .. })
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_field_display() {
        let err = CoreError::MissingField { field: "signature" };
        assert_eq!(err.to_string(), "Malformed envelope: missing signature");
        assert!(err.is_structural());
    }

    #[test]
    fn test_classification_is_disjoint() {
        let dec = CoreError::Decryption;
        assert!(dec.is_decryption_failure());
        assert!(!dec.is_structural());
        assert!(!dec.is_malformed_payload());

        let payload = CoreError::malformed_payload("not json");
        assert!(payload.is_malformed_payload());
        assert!(!payload.is_decryption_failure());
    }

    #[test]
    fn test_decryption_error_carries_no_detail() {
        assert_eq!(
            CoreError::Decryption.to_string(),
            "Decryption failed: authentication error"
        );
    }
}
