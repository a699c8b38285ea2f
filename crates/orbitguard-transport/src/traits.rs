// ============================================
// File: crates/orbitguard-transport/src/traits.rs
// ============================================
//! # Transport Traits
//!
//! ## Creation Reason
//! Defines the abstract outbound interface so the forwarder can be tested
//! without a real ground station, plus connection metadata for inbound
//! streams.
//!
//! ## Main Functionality
//! - `ConnectionSource`: Who connected and when
//! - `Outbound`: One-message-per-connection delivery to a destination
//!
//! ## ⚠️ Important Note for Next Developer
//! - Implementations must be Send + Sync for use in async contexts
//! - `Outbound::deliver` must bound its own duration (connect/write timeouts)
//!
//! ## Last Modified
//! v0.1.0 - Initial trait definitions

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::error::Result;

// ============================================
// ConnectionSource
// ============================================

/// Metadata about an accepted inbound connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionSource {
    /// Peer address (IP and port).
    pub addr: SocketAddr,
    /// When the connection was accepted.
    pub accepted_at: Instant,
}

impl ConnectionSource {
    /// Creates a new `ConnectionSource` stamped with the current instant.
    #[must_use]
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            accepted_at: Instant::now(),
        }
    }

    /// Creates a `ConnectionSource` with a specific timestamp.
    #[must_use]
    pub const fn with_timestamp(addr: SocketAddr, accepted_at: Instant) -> Self {
        Self { addr, accepted_at }
    }

    /// Returns how long ago the connection was accepted.
    #[must_use]
    pub fn age(&self) -> Duration {
        self.accepted_at.elapsed()
    }
}

// ============================================
// Outbound Trait
// ============================================

/// Abstract interface for one-shot outbound delivery.
///
/// # Contract
/// Each call opens a fresh connection, writes `payload`, closes the write
/// side and returns. No response is read.
///
/// # Example
/// ```ignore
/// async fn relay<O: Outbound>(out: &O, dest: SocketAddr, bytes: &[u8]) {
///     if let Err(e) = out.deliver(dest, bytes).await {
///         tracing::warn!("delivery failed: {}", e);
///     }
/// }
/// ```
#[async_trait]
pub trait Outbound: Send + Sync {
    /// Delivers `payload` to `dest` over a fresh connection.
    ///
    /// # Errors
    /// - `ConnectFailed` / `SendFailed`: network failure
    /// - `Timeout`: connect or write deadline expired
    async fn deliver(&self, dest: SocketAddr, payload: &[u8]) -> Result<()>;
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_source() {
        let addr: SocketAddr = "10.0.0.5:40000".parse().unwrap();
        let source = ConnectionSource::new(addr);

        assert_eq!(source.addr, addr);
        assert!(source.age() < Duration::from_secs(1));
    }
}
