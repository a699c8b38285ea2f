// ============================================
// File: crates/orbitguard-common/src/types.rs
// ============================================
//! # Core Type Definitions
//!
//! ## Creation Reason
//! Centralizes the identity of a traffic source so that the listener, the
//! flood detector and the alert log agree on what "one source" means.
//!
//! ## Main Functionality
//! - `SourceAddr`: Network-level origin of an inbound connection
//!
//! ## ⚠️ Important Note for Next Developer
//! - A source is the peer IP address only. The ephemeral port is dropped:
//!   a sensor opens a fresh connection (new port) for every message
//! - The envelope's `sender` field is NOT a source; it is sender-claimed
//!
//! ## Last Modified
//! v0.1.0 - Initial type definitions

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ============================================
// SourceAddr
// ============================================

/// Network-level origin of an inbound connection, the unit of rate limiting.
///
/// # Example
/// ```
/// use std::net::SocketAddr;
/// use orbitguard_common::types::SourceAddr;
///
/// let a: SourceAddr = "10.0.0.5:40001".parse::<SocketAddr>().unwrap().into();
/// let b: SourceAddr = "10.0.0.5:40002".parse::<SocketAddr>().unwrap().into();
/// assert_eq!(a, b);
/// assert_eq!(a.to_string(), "10.0.0.5");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceAddr(IpAddr);

impl SourceAddr {
    /// Creates a source from an IP address.
    #[must_use]
    pub const fn new(ip: IpAddr) -> Self {
        Self(ip)
    }

    /// Returns the underlying IP address.
    #[must_use]
    pub const fn ip(&self) -> IpAddr {
        self.0
    }
}

impl From<IpAddr> for SourceAddr {
    fn from(ip: IpAddr) -> Self {
        Self(ip)
    }
}

impl From<SocketAddr> for SourceAddr {
    fn from(addr: SocketAddr) -> Self {
        Self(addr.ip())
    }
}

impl FromStr for SourceAddr {
    type Err = std::net::AddrParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<IpAddr>().map(Self)
    }
}

impl fmt::Display for SourceAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_is_ignored() {
        let a = SourceAddr::from("192.168.1.40:50000".parse::<SocketAddr>().unwrap());
        let b = SourceAddr::from("192.168.1.40:50001".parse::<SocketAddr>().unwrap());
        assert_eq!(a, b);
    }

    #[test]
    fn test_parse_and_display() {
        let src: SourceAddr = "10.0.0.5".parse().unwrap();
        assert_eq!(src.to_string(), "10.0.0.5");
        assert!("not-an-ip".parse::<SourceAddr>().is_err());
    }
}
