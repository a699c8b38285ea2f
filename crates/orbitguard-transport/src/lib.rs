// ============================================
// File: crates/orbitguard-transport/src/lib.rs
// ============================================
//! # OrbitGuard Transport - Network I/O Layer
//!
//! ## Creation Reason
//! Provides the stream transport for the OrbitGuard relay: the inbound TCP
//! listener sensors connect to, and the outbound sender that reaches the
//! ground station.
//!
//! ## Main Functionality
//!
//! ### Modules
//! - [`traits`]: `Outbound` trait and connection metadata
//! - [`tcp`]: Listener, bounded message read, TCP sender
//! - [`error`]: Transport-specific error types
//! - `mock`: In-memory `Outbound` (tests, or the `mock` feature)
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    orbitguard-server                        │
//! │                           │                                 │
//! │        ┌──────────────────┼──────────────────────┐          │
//! │        ▼                  ▼                      ▼          │
//! │  orbitguard-core   orbitguard-transport   orbitguard-common │
//! │                    You are here                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Data Flow
//! ```text
//!   Sensors ──TCP──► TcpTransport ──► read_message ──► server pipeline
//!                                                          │
//!   Ground  ◄──TCP── TcpOutbound  ◄────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Always use the `Outbound` trait in callers for testability
//! - Every read and write here is deadline-bound
//!
//! ## Last Modified
//! v0.1.0 - Initial transport layer implementation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod tcp;
pub mod traits;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

// Re-export primary types
pub use error::{Result, TransportError};
pub use tcp::{read_message, TcpOutbound, TcpTransport, DEFAULT_BACKLOG};
pub use traits::{ConnectionSource, Outbound};

#[cfg(any(test, feature = "mock"))]
pub use mock::MockOutbound;
