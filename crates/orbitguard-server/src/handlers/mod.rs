// ============================================
// File: crates/orbitguard-server/src/handlers/mod.rs
// ============================================
//! # Message Handlers
//!
//! ## Creation Reason
//! Connects the screening services into the per-message pipeline the
//! listener runs for every accepted connection.
//!
//! ## Main Functionality
//!
//! ### Submodules
//! - [`envelope`]: Screening, verdicts and forwarding of sensor envelopes
//!
//! ## Data Flow
//! ```text
//! Sensor → Relay:
//!   1. Read one message (bounded size, read timeout)
//!   2. Blocklist short circuit
//!   3. Decode envelope
//!   4. Rate limiter admit
//!   5. Open payload with the shared key
//!   6. Bounds and signature checks
//!
//! Relay → Ground:
//!   7. Re-encode envelope, forward over a fresh connection
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Handlers run on the hot path of every connection
//! - Record findings as alerts, never as errors
//!
//! ## Last Modified
//! v0.1.0 - Initial handlers structure

pub mod envelope;

pub use envelope::{Check, Decision, EnvelopeHandler, Handled, RejectReason, Verdict};
