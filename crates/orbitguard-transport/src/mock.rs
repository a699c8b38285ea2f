// ============================================
// File: crates/orbitguard-transport/src/mock.rs
// ============================================
//! # Mock Outbound Implementation
//!
//! ## Creation Reason
//! Lets forwarder and pipeline tests observe deliveries without a real
//! ground station, and inject failures to exercise retry.
//!
//! ## Usage in Tests
//! ```ignore
//! let out = MockOutbound::new();
//! out.fail_next(2);
//! // ... run the forwarder ...
//! assert_eq!(out.delivered().len(), 1);
//! assert_eq!(out.attempts(), 3);
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - This is for testing only - do not use in production
//!
//! ## Last Modified
//! v0.1.0 - Initial mock implementation

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{Result, TransportError};
use crate::traits::Outbound;

/// In-memory `Outbound` that records every successful delivery.
#[derive(Debug, Default)]
pub struct MockOutbound {
    delivered: Mutex<Vec<(SocketAddr, Vec<u8>)>>,
    attempts: AtomicUsize,
    failures_left: AtomicUsize,
}

impl MockOutbound {
    /// Creates a mock that accepts every delivery.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` deliveries fail with `ConnectFailed`.
    pub fn fail_next(&self, count: usize) {
        self.failures_left.store(count, Ordering::SeqCst);
    }

    /// Returns a copy of every successful delivery, in order.
    #[must_use]
    pub fn delivered(&self) -> Vec<(SocketAddr, Vec<u8>)> {
        self.delivered.lock().clone()
    }

    /// Returns the number of delivery attempts, successful or not.
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Outbound for MockOutbound {
    async fn deliver(&self, dest: SocketAddr, payload: &[u8]) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(TransportError::ConnectFailed {
                dest,
                reason: "injected failure".into(),
            });
        }

        self.delivered.lock().push((dest, payload.to_vec()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_injected_failures_then_success() {
        let out = MockOutbound::new();
        let dest: SocketAddr = "127.0.0.1:5001".parse().unwrap();
        out.fail_next(1);

        assert!(out.deliver(dest, b"a").await.is_err());
        assert!(out.deliver(dest, b"b").await.is_ok());

        assert_eq!(out.attempts(), 2);
        assert_eq!(out.delivered(), vec![(dest, b"b".to_vec())]);
    }
}
