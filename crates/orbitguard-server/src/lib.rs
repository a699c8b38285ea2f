// ============================================
// File: crates/orbitguard-server/src/lib.rs
// ============================================
//! # OrbitGuard Relay Library
//!
//! ## Creation Reason
//! Provides the relay node that sits between untrusted ground sensors and
//! the trusted ground station, screening every message before it is
//! forwarded.
//!
//! ## Main Functionality
//!
//! ### Modules
//! - [`config`]: Relay configuration management
//! - [`server`]: Listener lifecycle and task orchestration
//! - [`services`]: Screening services
//!   - [`services::rate_limiter`]: Flood detection and blocklist
//!   - [`services::validator`]: Bounds and signature checks
//!   - [`services::alerts`]: Alert log and persister
//!   - [`services::forwarder`]: Downstream delivery
//!   - [`services::stats`]: Relay counters
//! - [`handlers`]: Per-message pipeline
//! - [`error`]: Server-specific error types
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        OrbitGuard Relay                         │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  ┌─────────────┐     ┌─────────────┐     ┌─────────────────┐    │
//! │  │   Config    │────►│   Server    │────►│ EnvelopeHandler │    │
//! │  └─────────────┘     └─────────────┘     └────────┬────────┘    │
//! │                                                   │             │
//! │         ┌──────────────┬──────────────┬───────────┴──┐          │
//! │         ▼              ▼              ▼              ▼          │
//! │  ┌─────────────┐ ┌───────────┐ ┌───────────┐ ┌─────────────┐    │
//! │  │ RateLimiter │ │ Unwrapper │ │ Validator │ │  Forwarder  │    │
//! │  └─────────────┘ └───────────┘ └───────────┘ └─────────────┘    │
//! │                                                                 │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                       Transport Layer                           │
//! │  ┌─────────────────────┐         ┌─────────────────────────┐    │
//! │  │   TCP listener      │         │   TCP outbound          │    │
//! │  │  (sensor messages)  │         │  (ground station)       │    │
//! │  └─────────────────────┘         └─────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Data Flow
//! ```text
//! Sensor → TCP → Decode → Admit → Decrypt → Validate → TCP → Ground
//!                   └───────┴────────┴─────────┴──► AlertLog
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Configuration changes require restart (no hot-reload)
//! - The blocklist lives in memory only and is cleared on restart
//!
//! ## Last Modified
//! v0.1.0 - Initial relay library

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod handlers;
pub mod server;
pub mod services;

// Re-export primary types
pub use config::ServerConfig;
pub use error::{Result, ServerError};
pub use server::Server;
