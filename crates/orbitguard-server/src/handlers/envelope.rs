// ============================================
// File: crates/orbitguard-server/src/handlers/envelope.rs
// ============================================
//! # Envelope Handler
//!
//! ## Creation Reason
//! Runs one received message through the screening pipeline and decides
//! whether it reaches the ground station.
//!
//! ## Main Functionality
//! - `EnvelopeHandler`: Owns the relay state shared by every connection
//! - `inspect`: Pure screening, returns a `Verdict`
//! - `handle`: Screening plus forwarding of accepted envelopes
//!
//! ## Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  raw bytes from one connection                              │
//! │                                                             │
//! │  1. Source blocked?          ──yes──► BLOCKED_SOURCE        │
//! │  2. Decode envelope          ──err──► INVALID_STRUCTURE     │
//! │  3. Rate limiter admit       ──flood► FLOOD_ATTACK_DETECTED │
//! │                              ──blocked► BLOCKED_SOURCE      │
//! │  4. Open payload             ──auth──► ENCRYPTION_TAMPERING │
//! │                              ──parse─► PROCESSING_ERROR     │
//! │  5. Bounds + signature       ──finding► DATA_/SIGNATURE_    │
//! │                                 (reject only if policy says)│
//! │  6. Forward the received bytes downstream unchanged         │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - No stage returns an error to the caller; every failure becomes a
//!   `Verdict` and at most a handful of alerts
//! - Malformed envelopes are rejected before the rate limiter, so they do
//!   not count toward a source's window
//! - Stages after a rejection never run
//!
//! ## Last Modified
//! v0.1.0 - Initial envelope handler

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info};

use orbitguard_common::time::Clock;
use orbitguard_common::types::SourceAddr;
use orbitguard_core::crypto::{SharedKey, Unwrapper};
use orbitguard_core::error::CoreError;
use orbitguard_core::protocol::{Envelope, EnvelopeCodec, TelemetryRecord};
use orbitguard_transport::Outbound;

use crate::config::ServerConfig;
use crate::services::{
    Admission, Alert, AlertKind, AlertLog, Finding, ForwardOutcome, Forwarder, RateLimiter,
    RelayStats, Validator,
};

// ============================================
// Verdict
// ============================================

/// Why a message was not forwarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Source is on the blocklist.
    BlockedSource,
    /// Bytes are not a valid envelope.
    InvalidStructure,
    /// This message pushed the source over the flood threshold.
    FloodAttack,
    /// Payload failed authentication.
    DecryptionFailed,
    /// Payload authenticated but is not a telemetry record.
    MalformedPayload,
    /// A finding that policy makes blocking.
    Policy(AlertKind),
}

impl RejectReason {
    /// Returns the short code used in logs.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::BlockedSource => "BLOCKED_SOURCE",
            Self::InvalidStructure => "INVALID_STRUCTURE",
            Self::FloodAttack => "FLOOD_ATTACK",
            Self::DecryptionFailed => "DECRYPTION_FAILED",
            Self::MalformedPayload => "MALFORMED_PAYLOAD",
            Self::Policy(kind) => kind.as_str(),
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Accept/reject decision for one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Forward downstream.
    Accept,
    /// Drop.
    Reject(RejectReason),
}

/// One entry of the per-message check trail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Check {
    /// Payload authenticated and parsed.
    DecryptionOk,
    /// Reading outside its bounds.
    DataAnomaly {
        /// Reading name
        field: &'static str,
    },
    /// Signature token mismatch.
    SignatureInvalid,
}

impl Check {
    /// Returns the trail code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::DecryptionOk => "DECRYPTION_OK",
            Self::DataAnomaly { .. } => "DATA_ANOMALY",
            Self::SignatureInvalid => "SIGNATURE_INVALID",
        }
    }
}

impl From<&Finding> for Check {
    fn from(finding: &Finding) -> Self {
        match finding {
            Finding::DataAnomaly { field, .. } => Self::DataAnomaly { field: *field },
            Finding::SignatureMismatch { .. } => Self::SignatureInvalid,
        }
    }
}

/// Screening result for one message.
#[derive(Debug, Clone)]
pub struct Verdict {
    /// Final decision
    pub decision: Decision,
    /// Checks run on the payload, in order
    pub checks: Vec<Check>,
    /// Parsed envelope, when decoding got that far
    pub envelope: Option<Envelope>,
    /// Decrypted record, when decryption got that far
    pub record: Option<TelemetryRecord>,
}

impl Verdict {
    fn reject(reason: RejectReason) -> Self {
        Self {
            decision: Decision::Reject(reason),
            checks: Vec::new(),
            envelope: None,
            record: None,
        }
    }

    /// Returns `true` if the message is to be forwarded.
    #[must_use]
    pub fn is_accepted(&self) -> bool {
        self.decision == Decision::Accept
    }

    /// Returns the rejection reason, if any.
    #[must_use]
    pub const fn reject_reason(&self) -> Option<RejectReason> {
        match self.decision {
            Decision::Accept => None,
            Decision::Reject(reason) => Some(reason),
        }
    }

    fn trail(&self) -> String {
        self.checks.iter().map(Check::code).collect::<Vec<_>>().join(",")
    }
}

/// Screening result plus what happened downstream.
#[derive(Debug, Clone)]
pub struct Handled {
    /// Screening result
    pub verdict: Verdict,
    /// Forwarding result, for accepted messages
    pub forward: Option<ForwardOutcome>,
}

// ============================================
// EnvelopeHandler
// ============================================

/// Screens and forwards messages.
///
/// # Thread Safety
/// Shared by every connection task behind an `Arc`; all mutable state
/// lives in the rate limiter, the alert log and the counters.
pub struct EnvelopeHandler {
    codec: EnvelopeCodec,
    unwrapper: Unwrapper,
    limiter: Arc<RateLimiter>,
    validator: Validator,
    alerts: Arc<AlertLog>,
    forwarder: Forwarder,
    stats: Arc<RelayStats>,
}

impl EnvelopeHandler {
    /// Builds the relay state from configuration.
    #[must_use]
    pub fn new(
        config: &ServerConfig,
        key: SharedKey,
        outbound: Arc<dyn Outbound>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let limits = &config.limits;
        Self {
            codec: EnvelopeCodec::new(limits.max_message_size),
            unwrapper: Unwrapper::new(key),
            limiter: Arc::new(RateLimiter::new(
                limits.flood_window(),
                limits.flood_threshold,
                limits.max_tracked_sources,
                clock,
            )),
            validator: Validator::new(config.bounds.clone(), config.policy),
            alerts: Arc::new(AlertLog::new(config.alerts.max_retained)),
            forwarder: Forwarder::new(outbound, &config.downstream),
            stats: Arc::new(RelayStats::new()),
        }
    }

    /// Returns the alert log.
    #[must_use]
    pub fn alerts(&self) -> &Arc<AlertLog> {
        &self.alerts
    }

    /// Returns the rate limiter.
    #[must_use]
    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Returns the relay counters.
    #[must_use]
    pub fn stats(&self) -> &Arc<RelayStats> {
        &self.stats
    }

    /// Returns the largest message the codec accepts.
    #[must_use]
    pub const fn max_message_size(&self) -> usize {
        self.codec.max_message_size()
    }

    /// Screens one message, recording alerts and counters.
    pub fn inspect(&self, source: SourceAddr, raw: &[u8]) -> Verdict {
        self.stats.record_received();

        if self.limiter.is_blocked(&source) {
            return self.blocked(source);
        }

        let envelope = match self.codec.decode(raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                self.stats.record_structure();
                self.alerts
                    .raise(AlertKind::InvalidStructure, source, e.to_string());
                return Verdict::reject(RejectReason::InvalidStructure);
            }
        };

        match self.limiter.admit(source) {
            Admission::Admitted { in_window } => {
                debug!(source = %source, sender = %envelope.sender, in_window, "Admitted");
            }
            Admission::Flooded { count } => {
                self.stats.record_flood();
                self.alerts.raise(
                    AlertKind::FloodAttackDetected,
                    source,
                    format!("{count} messages within the flood window, source blocked"),
                );
                return Verdict::reject(RejectReason::FloodAttack);
            }
            Admission::Blocked => return self.blocked(source),
        }

        let record = match self.unwrapper.open(&envelope.encrypted_payload) {
            Ok(record) => record,
            Err(e) => return self.reject_payload(source, envelope, &e),
        };

        let mut checks = vec![Check::DecryptionOk];
        let validation = self.validator.validate(&envelope, &record);
        for finding in &validation.findings {
            checks.push(Check::from(finding));
            self.alerts.record(Alert::with_severity(
                finding.alert_kind(),
                source,
                finding.details(),
                self.validator.severity_of(finding),
            ));
        }

        let decision = match &validation.blocking {
            Some(finding) => {
                self.stats.record_policy();
                Decision::Reject(RejectReason::Policy(finding.alert_kind()))
            }
            None => {
                self.stats.record_accepted();
                Decision::Accept
            }
        };

        let verdict = Verdict {
            decision,
            checks,
            envelope: Some(envelope),
            record: Some(record),
        };
        info!(
            source = %source,
            decision = ?verdict.decision,
            checks = %verdict.trail(),
            "Message screened"
        );
        verdict
    }

    /// Screens one message and forwards it if accepted.
    pub async fn handle(&self, source: SourceAddr, raw: &[u8]) -> Handled {
        let verdict = self.inspect(source, raw);

        if !verdict.is_accepted() {
            return Handled {
                verdict,
                forward: None,
            };
        }

        // Downstream gets the bytes exactly as received.
        let outcome = self.forwarder.forward(raw).await;
        if outcome.is_delivered() {
            self.stats.record_forwarded();
        } else {
            self.stats.record_forward_failure();
        }

        Handled {
            verdict,
            forward: Some(outcome),
        }
    }

    /// Records an unexpected failure while handling a connection from `source`.
    pub fn record_internal_error(&self, source: SourceAddr, details: impl Into<String>) {
        self.stats.record_panic();
        self.alerts
            .raise(AlertKind::ProcessingError, source, details);
    }

    /// Records a connection that ended without a usable message.
    pub fn record_abandoned(&self, source: SourceAddr, reason: &str) {
        debug!(source = %source, reason, "Connection abandoned");
        self.stats.record_abandoned();
    }

    fn blocked(&self, source: SourceAddr) -> Verdict {
        self.stats.record_blocked();
        self.alerts.raise(
            AlertKind::BlockedSource,
            source,
            "Message from blocked source dropped",
        );
        Verdict::reject(RejectReason::BlockedSource)
    }

    fn reject_payload(&self, source: SourceAddr, envelope: Envelope, err: &CoreError) -> Verdict {
        let reason = if err.is_decryption_failure() {
            self.stats.record_decryption();
            self.alerts.raise(
                AlertKind::EncryptionTampering,
                source,
                format!("Payload from {} failed authentication", envelope.sender),
            );
            RejectReason::DecryptionFailed
        } else {
            self.stats.record_payload();
            self.alerts
                .raise(AlertKind::ProcessingError, source, err.to_string());
            RejectReason::MalformedPayload
        };

        Verdict {
            envelope: Some(envelope),
            ..Verdict::reject(reason)
        }
    }
}

impl fmt::Debug for EnvelopeHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnvelopeHandler")
            .field("limiter", &self.limiter)
            .field("forwarder", &self.forwarder)
            .field("alerts", &self.alerts.len())
            .finish_non_exhaustive()
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use orbitguard_common::time::ManualClock;
    use orbitguard_core::protocol::expected_signature;
    use orbitguard_transport::MockOutbound;

    use crate::config::PolicyConfig;
    use crate::services::Severity;

    struct Harness {
        handler: EnvelopeHandler,
        out: Arc<MockOutbound>,
        clock: Arc<ManualClock>,
        sensor: Unwrapper,
    }

    fn key() -> SharedKey {
        SharedKey::from_bytes([0x5Au8; 32])
    }

    fn harness_with(config: ServerConfig) -> Harness {
        let out = Arc::new(MockOutbound::new());
        let clock = Arc::new(ManualClock::new());
        let handler = EnvelopeHandler::new(&config, key(), out.clone(), clock.clone());
        Harness {
            handler,
            out,
            clock,
            sensor: Unwrapper::new(key()),
        }
    }

    fn harness() -> Harness {
        harness_with(ServerConfig::default())
    }

    fn source() -> SourceAddr {
        "10.0.0.5".parse().unwrap()
    }

    fn reading(seq: u64) -> TelemetryRecord {
        TelemetryRecord::new("SENSOR_A", seq)
            .with_temperature(21.0)
            .with_levels(45.0, 88.0)
            .with_position(48.85, 2.35)
            .with_timestamp("2024-05-01T12:00:00")
    }

    fn wire(sensor: &Unwrapper, record: &TelemetryRecord) -> Vec<u8> {
        let envelope = sensor.seal_envelope(record).unwrap();
        EnvelopeCodec::default().encode(&envelope).unwrap()
    }

    #[tokio::test]
    async fn test_valid_message_is_forwarded() {
        let h = harness();
        let raw = wire(&h.sensor, &reading(1));

        let handled = h.handler.handle(source(), &raw).await;
        assert!(handled.verdict.is_accepted());
        assert_eq!(handled.verdict.checks, vec![Check::DecryptionOk]);
        assert_eq!(handled.forward, Some(ForwardOutcome::Delivered { attempts: 1 }));
        assert!(h.handler.alerts().is_empty());

        let delivered = h.out.delivered();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].1, raw);
    }

    #[tokio::test]
    async fn test_forwarded_bytes_keep_wide_numbers() {
        let h = harness();
        let payload = h.sensor.seal(&reading(3)).unwrap();
        let raw = format!(
            r#"{{"sender": "SENSOR_A", "encrypted_data": "{payload}", "signature": "{}", "reading_id": 123456789012345678901234567890}}"#,
            expected_signature(3)
        )
        .into_bytes();

        let handled = h.handler.handle(source(), &raw).await;
        assert!(handled.verdict.is_accepted());
        assert_eq!(handled.verdict.checks, vec![Check::DecryptionOk]);

        let delivered = h.out.delivered();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].1, raw);
        let text = String::from_utf8(delivered[0].1.clone()).unwrap();
        assert!(text.contains("123456789012345678901234567890"));
    }

    #[tokio::test]
    async fn test_flood_scenario() {
        let h = harness();

        for seq in 1..=15 {
            let handled = h.handler.handle(source(), &wire(&h.sensor, &reading(seq))).await;
            assert!(handled.verdict.is_accepted(), "message {seq} should pass");
            h.clock.advance(Duration::from_millis(50));
        }

        let handled = h.handler.handle(source(), &wire(&h.sensor, &reading(16))).await;
        assert_eq!(handled.verdict.reject_reason(), Some(RejectReason::FloodAttack));
        assert!(handled.forward.is_none());

        let floods: Vec<_> = h
            .handler
            .alerts()
            .snapshot()
            .into_iter()
            .filter(|a| a.kind == AlertKind::FloodAttackDetected)
            .collect();
        assert_eq!(floods.len(), 1);
        assert_eq!(floods[0].severity, Severity::High);
        assert!(h.handler.rate_limiter().is_blocked(&source()));
        assert_eq!(h.out.delivered().len(), 15);
    }

    #[tokio::test]
    async fn test_blocking_is_permanent_and_idempotent() {
        let h = harness();
        for seq in 1..=16 {
            h.handler.inspect(source(), &wire(&h.sensor, &reading(seq)));
        }

        h.clock.advance(Duration::from_secs(3600));
        for seq in 17..=19 {
            let verdict = h.handler.inspect(source(), &wire(&h.sensor, &reading(seq)));
            assert_eq!(verdict.reject_reason(), Some(RejectReason::BlockedSource));
        }

        assert_eq!(h.handler.alerts().count_of(AlertKind::FloodAttackDetected), 1);
        assert_eq!(h.handler.alerts().count_of(AlertKind::BlockedSource), 3);
        assert_eq!(h.handler.stats().snapshot().rejected_blocked, 3);

        let other: SourceAddr = "10.0.0.6".parse().unwrap();
        assert!(h.handler.inspect(other, &wire(&h.sensor, &reading(1))).is_accepted());
    }

    #[tokio::test]
    async fn test_cold_reading_is_forwarded_with_alert() {
        let h = harness();
        let record = reading(3).with_temperature(-120.0);

        let handled = h.handler.handle(source(), &wire(&h.sensor, &record)).await;
        assert!(handled.verdict.is_accepted());
        assert!(handled.forward.unwrap().is_delivered());
        assert_eq!(
            handled.verdict.checks,
            vec![Check::DecryptionOk, Check::DataAnomaly { field: "temperature" }]
        );

        let alerts = h.handler.alerts().snapshot();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, AlertKind::DataTampering);
        assert_eq!(alerts[0].severity, Severity::Medium);
    }

    #[tokio::test]
    async fn test_foreign_key_is_rejected_without_forwarding() {
        let h = harness();
        let intruder = Unwrapper::new(SharedKey::from_bytes([0x11u8; 32]));

        let handled = h.handler.handle(source(), &wire(&intruder, &reading(1))).await;
        assert_eq!(
            handled.verdict.reject_reason(),
            Some(RejectReason::DecryptionFailed)
        );
        assert!(handled.verdict.record.is_none());

        let alerts = h.handler.alerts().snapshot();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].kind, AlertKind::EncryptionTampering);
        assert_eq!(alerts[0].severity, Severity::High);
        assert_eq!(h.out.attempts(), 0);
    }

    #[tokio::test]
    async fn test_missing_fields_are_invalid_structure() {
        let h = harness();
        let inputs: [&[u8]; 5] = [
            br#"{"encrypted_data":"x","signature":"SIG_000001"}"#,
            br#"{"sender":"A","signature":"SIG_000001"}"#,
            br#"{"sender":"A","encrypted_data":"x"}"#,
            br#""just a string""#,
            b"not json at all",
        ];

        for raw in inputs {
            let handled = h.handler.handle(source(), raw).await;
            assert_eq!(
                handled.verdict.reject_reason(),
                Some(RejectReason::InvalidStructure)
            );
        }

        assert_eq!(h.handler.alerts().count_of(AlertKind::InvalidStructure), 5);
        assert_eq!(h.handler.rate_limiter().in_window(&source()), 0);
        assert_eq!(h.out.attempts(), 0);
    }

    #[tokio::test]
    async fn test_oversized_input_is_invalid_structure() {
        let h = harness();
        let raw = vec![b' '; h.handler.max_message_size() + 1];
        let verdict = h.handler.inspect(source(), &raw);
        assert_eq!(verdict.reject_reason(), Some(RejectReason::InvalidStructure));
    }

    #[tokio::test]
    async fn test_malformed_payload() {
        let h = harness();
        let envelope = Envelope::new(
            "SENSOR_A",
            None,
            h.sensor.seal_bytes(b"[1, 2, 3]").unwrap(),
            "SIG_000001",
        );
        let raw = EnvelopeCodec::default().encode(&envelope).unwrap();

        let handled = h.handler.handle(source(), &raw).await;
        assert_eq!(
            handled.verdict.reject_reason(),
            Some(RejectReason::MalformedPayload)
        );
        assert_eq!(h.handler.alerts().count_of(AlertKind::ProcessingError), 1);
        assert_eq!(h.out.attempts(), 0);
    }

    #[tokio::test]
    async fn test_signature_mismatch_advisory_by_default() {
        let h = harness();
        let mut envelope = h.sensor.seal_envelope(&reading(7)).unwrap();
        envelope.signature_token = "SIG_000008".into();
        let raw = EnvelopeCodec::default().encode(&envelope).unwrap();

        let handled = h.handler.handle(source(), &raw).await;
        assert!(handled.verdict.is_accepted());
        assert!(handled.verdict.checks.contains(&Check::SignatureInvalid));
        assert_eq!(h.handler.alerts().count_of(AlertKind::SignatureTampering), 1);
        assert_eq!(h.out.delivered().len(), 1);
    }

    #[tokio::test]
    async fn test_signature_mismatch_blocking_policy() {
        let config = ServerConfig {
            policy: PolicyConfig {
                block_on_signature_mismatch: true,
                ..PolicyConfig::default()
            },
            ..ServerConfig::default()
        };
        let h = harness_with(config);
        let mut envelope = h.sensor.seal_envelope(&reading(7)).unwrap();
        envelope.signature_token = "SIG_000008".into();
        let raw = EnvelopeCodec::default().encode(&envelope).unwrap();

        let handled = h.handler.handle(source(), &raw).await;
        assert_eq!(
            handled.verdict.reject_reason(),
            Some(RejectReason::Policy(AlertKind::SignatureTampering))
        );
        assert_eq!(h.out.attempts(), 0);
        assert!(!h.handler.rate_limiter().is_blocked(&source()));
    }

    #[tokio::test]
    async fn test_forward_failure_is_counted() {
        let h = harness();
        h.out.fail_next(1);

        let handled = h.handler.handle(source(), &wire(&h.sensor, &reading(1))).await;
        assert!(handled.verdict.is_accepted());
        assert!(!handled.forward.unwrap().is_delivered());

        let snap = h.handler.stats().snapshot();
        assert_eq!(snap.accepted, 1);
        assert_eq!(snap.forward_failures, 1);
        assert_eq!(snap.forwarded, 0);
    }

    #[test]
    fn test_internal_error_is_recorded() {
        let h = harness();
        h.handler.record_internal_error(source(), "task panicked");

        let alerts = h.handler.alerts().snapshot();
        assert_eq!(alerts[0].kind, AlertKind::ProcessingError);
        assert_eq!(alerts[0].severity, Severity::Medium);
        assert_eq!(h.handler.stats().snapshot().panics, 1);
    }
}
