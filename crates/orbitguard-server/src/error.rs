// ============================================
// File: crates/orbitguard-server/src/error.rs
// ============================================
//! # Server Error Types
//!
//! Errors that can stop the relay from starting or surface at the binary
//! boundary. Per-message failures never appear here: the pipeline turns
//! them into a `Verdict` and an alert.
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use thiserror::Error;

use orbitguard_core::error::CoreError;
use orbitguard_transport::error::TransportError;

/// Result type for server operations.
pub type Result<T> = std::result::Result<T, ServerError>;

/// Server error types.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Configuration file could not be read or parsed.
    #[error("Failed to load configuration from '{path}': {reason}")]
    ConfigLoad {
        /// File path
        path: String,
        /// Why loading failed
        reason: String,
    },

    /// Configuration value is out of range or inconsistent.
    #[error("Invalid configuration: {field} - {reason}")]
    ConfigInvalid {
        /// Dotted field path
        field: String,
        /// Why it's invalid
        reason: String,
    },

    /// A required configuration value is absent.
    #[error("Missing required configuration: {field}")]
    ConfigMissing {
        /// Dotted field path
        field: String,
    },

    /// Alert log file could not be opened or written.
    #[error("Alert persistence failed for '{path}': {reason}")]
    AlertPersist {
        /// Log file path
        path: String,
        /// Why it failed
        reason: String,
    },

    /// Server could not start.
    #[error("Server failed to start: {reason}")]
    StartupFailed {
        /// Why startup failed
        reason: String,
    },

    /// Error from core crate.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Error from transport crate.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Raw I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServerError {
    /// Creates a `ConfigLoad` error.
    pub fn config_load(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConfigLoad {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Creates a `ConfigInvalid` error.
    pub fn config_invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConfigInvalid {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Creates an `AlertPersist` error.
    pub fn alert_persist(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::AlertPersist {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Creates a `StartupFailed` error.
    pub fn startup_failed(reason: impl Into<String>) -> Self {
        Self::StartupFailed {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ServerError::config_load("/etc/orbitguard.toml", "file not found");
        assert!(err.to_string().contains("/etc/orbitguard.toml"));
    }

    #[test]
    fn test_transport_error_is_transparent() {
        let err = ServerError::from(TransportError::ShuttingDown);
        assert!(matches!(err, ServerError::Transport(_)));
        assert_eq!(err.to_string(), TransportError::ShuttingDown.to_string());
    }
}
