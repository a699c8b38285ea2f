// ============================================
// File: crates/orbitguard-server/src/services/validator.rs
// ============================================
//! # Anomaly & Signature Validator
//!
//! ## Creation Reason
//! Inspects a decrypted telemetry record for implausible readings and
//! checks the envelope's signature token against the sealed sequence.
//!
//! ## Checks
//! ```text
//! record ──► bounds (temperature, humidity, battery, latitude, longitude)
//!        │     each reading outside its range → DataAnomaly
//!        └─► signature (only when `sequence` is present)
//!              token ≠ SIG_%06d(sequence)     → SignatureMismatch
//! ```
//!
//! Findings are advisory unless the matching policy switch is on; the
//! validator reports both the findings and whether any of them blocks.
//!
//! ## Last Modified
//! v0.1.0 - Initial validator

use orbitguard_core::protocol::{expected_signature, Envelope, TelemetryRecord};

use crate::config::{BoundsConfig, PolicyConfig, ValueRange};
use crate::services::alerts::{AlertKind, Severity};

// ============================================
// Finding
// ============================================

/// One problem found in an authentic record.
#[derive(Debug, Clone, PartialEq)]
pub enum Finding {
    /// Reading outside its configured range.
    DataAnomaly {
        /// Reading name
        field: &'static str,
        /// Value received
        value: f64,
        /// Range it violated
        range: ValueRange,
    },
    /// Signature token does not match the sealed sequence.
    SignatureMismatch {
        /// Token derived from the sequence
        expected: String,
        /// Token on the envelope
        received: String,
    },
}

impl Finding {
    /// Returns the alert kind this finding raises.
    #[must_use]
    pub const fn alert_kind(&self) -> AlertKind {
        match self {
            Self::DataAnomaly { .. } => AlertKind::DataTampering,
            Self::SignatureMismatch { .. } => AlertKind::SignatureTampering,
        }
    }

    /// Returns the alert text for this finding.
    #[must_use]
    pub fn details(&self) -> String {
        match self {
            Self::DataAnomaly { field, value, range } => format!(
                "{field}: {value} outside [{}, {}]",
                range.min, range.max
            ),
            Self::SignatureMismatch { expected, received } => {
                format!("Expected {expected}, got {received}")
            }
        }
    }
}

// ============================================
// Validation
// ============================================

/// Outcome of validating one record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Validation {
    /// Every finding, bounds first then signature.
    pub findings: Vec<Finding>,
    /// Whether policy turns any finding into a rejection.
    pub blocking: Option<Finding>,
}

// ============================================
// Validator
// ============================================

/// Applies bounds and signature checks under a policy.
#[derive(Debug, Clone)]
pub struct Validator {
    bounds: BoundsConfig,
    policy: PolicyConfig,
}

impl Validator {
    /// Creates a validator.
    #[must_use]
    pub const fn new(bounds: BoundsConfig, policy: PolicyConfig) -> Self {
        Self { bounds, policy }
    }

    /// Returns the severity to raise for `finding` under the current policy.
    #[must_use]
    pub fn severity_of(&self, finding: &Finding) -> Severity {
        match finding {
            Finding::DataAnomaly { .. } if self.policy.escalate_data_anomalies => Severity::High,
            other => other.alert_kind().severity(),
        }
    }

    /// Checks every configured reading that is present on `record`.
    #[must_use]
    pub fn check_bounds(&self, record: &TelemetryRecord) -> Vec<Finding> {
        let readings = [
            record.temperature,
            record.humidity,
            record.battery,
            record.latitude,
            record.longitude,
        ];

        self.bounds
            .named()
            .into_iter()
            .zip(readings)
            .filter_map(|((field, range), value)| {
                let value = value?;
                (!range.contains(value)).then_some(Finding::DataAnomaly { field, value, range })
            })
            .collect()
    }

    /// Compares the envelope's token with the one derived from the record.
    #[must_use]
    pub fn check_signature(&self, envelope: &Envelope, record: &TelemetryRecord) -> Option<Finding> {
        let expected = expected_signature(record.sequence?);
        (envelope.signature_token != expected).then(|| Finding::SignatureMismatch {
            expected,
            received: envelope.signature_token.clone(),
        })
    }

    /// Runs all checks and applies the blocking policy.
    #[must_use]
    pub fn validate(&self, envelope: &Envelope, record: &TelemetryRecord) -> Validation {
        let mut findings = self.check_bounds(record);
        findings.extend(self.check_signature(envelope, record));

        let blocking = findings.iter().find(|f| self.blocks(f)).cloned();
        Validation { findings, blocking }
    }

    fn blocks(&self, finding: &Finding) -> bool {
        match finding {
            Finding::DataAnomaly { .. } => self.policy.block_on_anomaly,
            Finding::SignatureMismatch { .. } => self.policy.block_on_signature_mismatch,
        }
    }
}

// ============================================
// Tests
// ============================================
