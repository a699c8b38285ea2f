// ============================================
// File: crates/orbitguard-common/src/lib.rs
// ============================================
//! # OrbitGuard Common - Shared Utilities Library
//!
//! ## Creation Reason
//! Provides foundational types and utilities shared across all OrbitGuard
//! crates, ensuring consistency and reducing code duplication.
//!
//! ## Main Functionality
//! - [`types`]: Source address identity
//! - [`time`]: Injectable monotonic clock and wall-clock helpers
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    orbitguard-server                        │
//! │                           │                                 │
//! │        ┌──────────────────┼──────────────────────┐          │
//! │        ▼                  ▼                      ▼          │
//! │  orbitguard-core   orbitguard-transport   orbitguard-common │
//! │                                          You are here       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - This crate is the foundation - changes affect everything
//! - Keep dependencies minimal
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod time;
pub mod types;

// Re-export commonly used items at crate root
pub use time::{Clock, ManualClock, SystemClock};
pub use types::SourceAddr;
