// ============================================
// File: crates/orbitguard-server/src/services/forwarder.rs
// ============================================
//! # Forwarder
//!
//! ## Creation Reason
//! Delivers accepted envelopes to the ground station over a fresh
//! outbound connection per message.
//!
//! ## Main Functionality
//! - Optional simulated downlink latency before the first attempt
//! - Fire-and-once by default; bounded retry with doubling backoff when
//!   `downstream.max_attempts > 1`
//! - Never returns an error: the outcome is a value the handler logs
//!
//! ## Retry Timeline (max_attempts = 3, backoff = 250ms)
//! ```text
//! t=0     attempt 1 ──✗ (retryable)
//! t=250   attempt 2 ──✗ (retryable)
//! t=750   attempt 3 ──✓ Delivered { attempts: 3 }
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Only errors classified `is_retryable` are retried
//! - The inbound connection is already closed when this runs
//!
//! ## Last Modified
//! v0.1.0 - Initial forwarder

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use orbitguard_transport::Outbound;

use crate::config::DownstreamConfig;

// ============================================
// ForwardOutcome
// ============================================

/// Result of forwarding one envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForwardOutcome {
    /// Ground station received the bytes.
    Delivered {
        /// Attempts used, including the successful one
        attempts: u32,
    },
    /// Every attempt failed, or the failure was not retryable.
    Failed {
        /// Attempts made
        attempts: u32,
        /// Last error
        reason: String,
    },
}

impl ForwardOutcome {
    /// Returns `true` if the envelope was delivered.
    #[must_use]
    pub const fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered { .. })
    }
}

// ============================================
// Forwarder
// ============================================

/// Sends accepted envelopes downstream.
pub struct Forwarder {
    outbound: Arc<dyn Outbound>,
    dest: SocketAddr,
    max_attempts: u32,
    retry_backoff: Duration,
    link_latency: Duration,
}

impl Forwarder {
    /// Creates a forwarder for `config.addr` over `outbound`.
    #[must_use]
    pub fn new(outbound: Arc<dyn Outbound>, config: &DownstreamConfig) -> Self {
        Self {
            outbound,
            dest: config.addr,
            max_attempts: config.max_attempts.max(1),
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
            link_latency: Duration::from_millis(config.link_latency_ms),
        }
    }

    /// Returns the ground station address.
    #[must_use]
    pub const fn destination(&self) -> SocketAddr {
        self.dest
    }

    /// Forwards `payload`, retrying transient failures up to the configured limit.
    pub async fn forward(&self, payload: &[u8]) -> ForwardOutcome {
        if !self.link_latency.is_zero() {
            tokio::time::sleep(self.link_latency).await;
        }

        let mut backoff = self.retry_backoff;
        let mut attempt = 0;

        loop {
            attempt += 1;

            match self.outbound.deliver(self.dest, payload).await {
                Ok(()) => {
                    debug!(dest = %self.dest, attempt, bytes = payload.len(), "Envelope forwarded");
                    return ForwardOutcome::Delivered { attempts: attempt };
                }
                Err(e) if e.is_retryable() && attempt < self.max_attempts => {
                    debug!(dest = %self.dest, attempt, error = %e, "Forward failed, retrying");
                    tokio::time::sleep(backoff).await;
                    backoff = backoff.saturating_mul(2);
                }
                Err(e) => {
                    if e.is_timeout() {
                        debug!(dest = %self.dest, attempt, "Forward timed out");
                    } else {
                        warn!(dest = %self.dest, attempt, error = %e, "Forward failed");
                    }
                    return ForwardOutcome::Failed {
                        attempts: attempt,
                        reason: e.to_string(),
                    };
                }
            }
        }
    }
}

impl std::fmt::Debug for Forwarder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Forwarder")
            .field("dest", &self.dest)
            .field("max_attempts", &self.max_attempts)
            .field("retry_backoff", &self.retry_backoff)
            .field("link_latency", &self.link_latency)
            .finish_non_exhaustive()
    }
}

// ============================================
// Tests
// ============================================
