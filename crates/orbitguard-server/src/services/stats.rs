// ============================================
// File: crates/orbitguard-server/src/services/stats.rs
// ============================================
//! # Relay Statistics
//!
//! Lock-free counters updated by every connection task and logged
//! periodically by the server.
//!
//! Every received message ends in exactly one of: accepted, one rejected
//! bucket, abandoned or panicked. Forward outcomes are counted separately
//! for accepted messages.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

// ============================================
// RelayStats
// ============================================

/// Relay-wide counters.
#[derive(Debug, Default)]
pub struct RelayStats {
    received: AtomicU64,
    accepted: AtomicU64,
    forwarded: AtomicU64,
    forward_failures: AtomicU64,
    rejected_blocked: AtomicU64,
    rejected_flood: AtomicU64,
    rejected_structure: AtomicU64,
    rejected_decryption: AtomicU64,
    rejected_payload: AtomicU64,
    rejected_policy: AtomicU64,
    abandoned: AtomicU64,
    panics: AtomicU64,
}

impl RelayStats {
    /// Creates zeroed counters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_accepted(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_forwarded(&self) {
        self.forwarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_forward_failure(&self) {
        self.forward_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_blocked(&self) {
        self.rejected_blocked.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_flood(&self) {
        self.rejected_flood.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_structure(&self) {
        self.rejected_structure.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_decryption(&self) {
        self.rejected_decryption.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_payload(&self) {
        self.rejected_payload.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_policy(&self) {
        self.rejected_policy.fetch_add(1, Ordering::Relaxed);
    }

    /// Connection closed by timeout or without sending anything.
    pub fn record_abandoned(&self) {
        self.abandoned.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_panic(&self) {
        self.panics.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns a point-in-time copy of every counter.
    #[must_use]
    pub fn snapshot(&self) -> RelayStatsSnapshot {
        RelayStatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            accepted: self.accepted.load(Ordering::Relaxed),
            forwarded: self.forwarded.load(Ordering::Relaxed),
            forward_failures: self.forward_failures.load(Ordering::Relaxed),
            rejected_blocked: self.rejected_blocked.load(Ordering::Relaxed),
            rejected_flood: self.rejected_flood.load(Ordering::Relaxed),
            rejected_structure: self.rejected_structure.load(Ordering::Relaxed),
            rejected_decryption: self.rejected_decryption.load(Ordering::Relaxed),
            rejected_payload: self.rejected_payload.load(Ordering::Relaxed),
            rejected_policy: self.rejected_policy.load(Ordering::Relaxed),
            abandoned: self.abandoned.load(Ordering::Relaxed),
            panics: self.panics.load(Ordering::Relaxed),
        }
    }
}

// ============================================
// RelayStatsSnapshot
// ============================================

/// Copy of the relay counters.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RelayStatsSnapshot {
    pub received: u64,
    pub accepted: u64,
    pub forwarded: u64,
    pub forward_failures: u64,
    pub rejected_blocked: u64,
    pub rejected_flood: u64,
    pub rejected_structure: u64,
    pub rejected_decryption: u64,
    pub rejected_payload: u64,
    pub rejected_policy: u64,
    pub abandoned: u64,
    pub panics: u64,
}

impl RelayStatsSnapshot {
    /// Total rejected messages across all reasons.
    #[must_use]
    pub const fn rejected(&self) -> u64 {
        self.rejected_blocked
            + self.rejected_flood
            + self.rejected_structure
            + self.rejected_decryption
            + self.rejected_payload
            + self.rejected_policy
    }
}

impl fmt::Display for RelayStatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "received={} accepted={} rejected={} (blocked={} flood={} structure={} \
             decryption={} payload={} policy={}) forwarded={} forward_failures={} \
             abandoned={} panics={}",
            self.received,
            self.accepted,
            self.rejected(),
            self.rejected_blocked,
            self.rejected_flood,
            self.rejected_structure,
            self.rejected_decryption,
            self.rejected_payload,
            self.rejected_policy,
            self.forwarded,
            self.forward_failures,
            self.abandoned,
            self.panics,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_and_totals() {
        let stats = RelayStats::new();
        stats.record_received();
        stats.record_received();
        stats.record_received();
        stats.record_accepted();
        stats.record_forwarded();
        stats.record_flood();
        stats.record_decryption();

        let snap = stats.snapshot();
        assert_eq!(snap.received, 3);
        assert_eq!(snap.accepted, 1);
        assert_eq!(snap.forwarded, 1);
        assert_eq!(snap.rejected(), 2);
        assert!(snap.to_string().contains("flood=1"));
    }
}
