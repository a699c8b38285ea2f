// ============================================
// File: crates/orbitguard-common/src/time.rs
// ============================================
//! # Time Utilities
//!
//! ## Creation Reason
//! The flood detector reasons about arrival instants, and its tests need to
//! move time forward without sleeping. Monotonic time is therefore read
//! through a [`Clock`] handle instead of calling `Instant::now()` directly.
//!
//! ## Main Functionality
//! - `Clock`: Source of monotonic instants
//! - `SystemClock`: Production clock backed by `Instant::now()`
//! - `ManualClock`: Lock-free, manually advanced clock for tests and replay
//! - `iso_timestamp()`: Wall-clock ISO-8601 string for alert records
//!
//! ## ⚠️ Important Note for Next Developer
//! - `ManualClock` stores nanoseconds in an `AtomicU64` offset from a fixed base
//! - Sender-claimed timestamps in envelopes are never parsed into instants;
//!   they are untrusted strings
//!
//! ## Last Modified
//! v0.1.0 - Initial time utilities

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use chrono::{SecondsFormat, Utc};

// ============================================
// Clock
// ============================================

/// A source of monotonic instants.
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Returns the current instant.
    fn now(&self) -> Instant;
}

/// Production clock reading the OS monotonic clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

// ============================================
// ManualClock
// ============================================

/// Clock that only moves when told to.
///
/// # Implementation
/// Stores nanoseconds elapsed since a base instant captured at construction.
/// Uses `AtomicU64`, so it can be advanced from one task while being read
/// from others.
///
/// # Example
/// ```
/// use std::time::Duration;
/// use orbitguard_common::time::{Clock, ManualClock};
///
/// let clock = ManualClock::new();
/// let before = clock.now();
/// clock.advance(Duration::from_secs(10));
/// assert_eq!(clock.now() - before, Duration::from_secs(10));
/// ```
#[derive(Debug)]
pub struct ManualClock {
    base: Instant,
    offset_nanos: AtomicU64,
}

impl ManualClock {
    /// Creates a clock frozen at the current instant.
    #[must_use]
    pub fn new() -> Self {
        Self {
            base: Instant::now(),
            offset_nanos: AtomicU64::new(0),
        }
    }

    /// Moves the clock forward by `by`.
    pub fn advance(&self, by: Duration) {
        let nanos = u64::try_from(by.as_nanos()).unwrap_or(u64::MAX);
        self.offset_nanos.fetch_add(nanos, Ordering::Relaxed);
    }

    /// Returns how far the clock has been advanced since construction.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        Duration::from_nanos(self.offset_nanos.load(Ordering::Relaxed))
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + self.elapsed()
    }
}

// ============================================
// Wall Clock Helpers
// ============================================

/// Returns the current UTC time as an ISO-8601 string with millisecond precision.
#[must_use]
pub fn iso_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Converts a millisecond count from configuration into a `Duration`.
#[must_use]
pub const fn millis(ms: u64) -> Duration {
    Duration::from_millis(ms)
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_manual_clock_is_frozen() {
        let clock = ManualClock::new();
        let a = clock.now();
        thread::sleep(Duration::from_millis(5));
        assert_eq!(clock.now(), a);
    }

    #[test]
    fn test_manual_clock_advance() {
        let clock = ManualClock::new();
        let start = clock.now();
        clock.advance(Duration::from_millis(1500));
        clock.advance(Duration::from_millis(500));
        assert_eq!(clock.now().duration_since(start), Duration::from_secs(2));
        assert_eq!(clock.elapsed(), Duration::from_secs(2));
    }

    #[test]
    fn test_manual_clock_shared_across_threads() {
        let clock = Arc::new(ManualClock::new());
        let start = clock.now();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let clock = Arc::clone(&clock);
                thread::spawn(move || clock.advance(Duration::from_secs(1)))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(clock.now() - start, Duration::from_secs(4));
    }

    #[test]
    fn test_system_clock_moves_forward() {
        let clock = SystemClock;
        let a = clock.now();
        thread::sleep(Duration::from_millis(2));
        assert!(clock.now() > a);
    }

    #[test]
    fn test_iso_timestamp_format() {
        let ts = iso_timestamp();
        assert!(ts.ends_with('Z'));
        assert!(chrono::DateTime::parse_from_rfc3339(&ts).is_ok());
    }
}
