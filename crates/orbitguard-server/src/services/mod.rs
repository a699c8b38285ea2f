// ============================================
// File: crates/orbitguard-server/src/services/mod.rs
// ============================================
//! # Relay Services
//!
//! ## Creation Reason
//! Holds the screening logic of the relay, separated from transport and
//! wire-format concerns so each stage can be tested on its own.
//!
//! ## Main Functionality
//!
//! ### Submodules
//! - [`rate_limiter`]: Per-source sliding window and blocklist
//! - [`validator`]: Bounds and signature checks on decrypted records
//! - [`alerts`]: Alert vocabulary, in-memory log and JSONL persister
//! - [`forwarder`]: Downstream delivery with optional retry
//! - [`stats`]: Relay-wide counters
//!
//! ## Service Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Service Layer                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ┌─────────────────┐   ┌─────────────────────────────────┐  │
//! │  │   RateLimiter   │   │          Validator              │  │
//! │  │  - Window       │   │  - Bounds                       │  │
//! │  │  - Blocklist    │   │  - Signature token              │  │
//! │  └────────┬────────┘   └──────────────┬──────────────────┘  │
//! │           │      findings             │                     │
//! │           └──────────┬────────────────┘                     │
//! │                      ▼                                      │
//! │  ┌─────────────────────────────┐   ┌─────────────────────┐  │
//! │  │          AlertLog           │──►│   AlertPersister    │  │
//! │  └─────────────────────────────┘   └─────────────────────┘  │
//! │                                                             │
//! │  ┌─────────────────┐   ┌─────────────────┐                  │
//! │  │    Forwarder    │   │   RelayStats    │                  │
//! │  └─────────────────┘   └─────────────────┘                  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - `RateLimiter` and `AlertLog` are the only state shared across connections
//! - All services are Send + Sync and are shared behind `Arc`
//!
//! ## Last Modified
//! v0.1.0 - Initial services structure

pub mod alerts;
pub mod forwarder;
pub mod rate_limiter;
pub mod stats;
pub mod validator;

pub use alerts::{Alert, AlertKind, AlertLog, AlertPersister, Severity};
pub use forwarder::{ForwardOutcome, Forwarder};
pub use rate_limiter::{Admission, RateLimiter};
pub use stats::{RelayStats, RelayStatsSnapshot};
pub use validator::{Finding, Validation, Validator};
