// ============================================
// File: crates/orbitguard-transport/src/error.rs
// ============================================
//! # Transport Error Types
//!
//! ## Creation Reason
//! Defines error types specific to transport layer operations: the inbound
//! listener, message reads and the one-shot outbound sender.
//!
//! ## Error Categories
//! 1. **Setup Errors**: Bind failures, invalid addresses
//! 2. **Network Errors**: Accept/receive/connect/send failures
//! 3. **Timeouts**: Read, connect and write deadlines
//! 4. **System Errors**: Raw I/O with context
//!
//! ## ⚠️ Important Note for Next Developer
//! - Timeouts and resets are transient: log them at debug, never alert
//! - Setup errors are fatal at startup and surface through `main`
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

// ============================================
// Result Type Alias
// ============================================

/// Result type for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;

// ============================================
// TransportError
// ============================================

/// Transport layer error types.
#[derive(Error, Debug)]
pub enum TransportError {
    // ========================================
    // Setup Errors
    // ========================================

    /// Failed to bind to address.
    #[error("Failed to bind to {addr}: {reason}")]
    BindFailed {
        /// Address we tried to bind to
        addr: SocketAddr,
        /// Why binding failed
        reason: String,
    },

    /// Address already in use.
    #[error("Address {addr} already in use")]
    AddressInUse {
        /// The address that's in use
        addr: SocketAddr,
    },

    /// Invalid socket address.
    #[error("Invalid address: {addr}")]
    InvalidAddress {
        /// The invalid address string
        addr: String,
    },

    // ========================================
    // Network Errors
    // ========================================

    /// Accepting an inbound connection failed.
    #[error("Failed to accept connection: {reason}")]
    AcceptFailed {
        /// Why accept failed
        reason: String,
    },

    /// Reading from a connection failed.
    #[error("Failed to receive: {reason}")]
    ReceiveFailed {
        /// Why receive failed
        reason: String,
    },

    /// Connecting to a destination failed.
    #[error("Failed to connect to {dest}: {reason}")]
    ConnectFailed {
        /// Destination address
        dest: SocketAddr,
        /// Why connect failed
        reason: String,
    },

    /// Writing to a destination failed.
    #[error("Failed to send to {dest}: {reason}")]
    SendFailed {
        /// Destination address
        dest: SocketAddr,
        /// Why send failed
        reason: String,
    },

    /// Operation timed out.
    #[error("Operation timed out: {operation} after {duration_ms}ms")]
    Timeout {
        /// What operation timed out
        operation: String,
        /// Deadline in milliseconds
        duration_ms: u64,
    },

    /// Listener is shutting down.
    #[error("Transport is shutting down")]
    ShuttingDown,

    // ========================================
    // Wrapped Errors
    // ========================================

    /// I/O error from the system.
    #[error("I/O error: {context}")]
    Io {
        /// What was happening when the error occurred
        context: String,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },
}

impl TransportError {
    // ========================================
    // Convenience Constructors
    // ========================================

    /// Creates a `BindFailed` error.
    pub fn bind_failed(addr: SocketAddr, reason: impl Into<String>) -> Self {
        Self::BindFailed {
            addr,
            reason: reason.into(),
        }
    }

    /// Creates an `Io` error with context.
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Creates a `Timeout` error.
    pub fn timeout(operation: impl Into<String>, duration: std::time::Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
        }
    }

    // ========================================
    // Error Classification
    // ========================================

    /// Returns `true` if this error is transient and retryable.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. }
            | Self::ConnectFailed { .. }
            | Self::SendFailed { .. }
            | Self::ReceiveFailed { .. } => true,
            Self::Io { source, .. } => matches!(
                source.kind(),
                io::ErrorKind::WouldBlock
                    | io::ErrorKind::Interrupted
                    | io::ErrorKind::TimedOut
                    | io::ErrorKind::ConnectionRefused
                    | io::ErrorKind::ConnectionReset
            ),
            _ => false,
        }
    }

    /// Returns `true` if a deadline expired.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

// ============================================
// Error Conversions
// ============================================

impl From<io::Error> for TransportError {
    fn from(err: io::Error) -> Self {
        Self::Io {
            context: "unspecified I/O operation".into(),
            source: err,
        }
    }
}

// ============================================
// Tests
// ============================================
