// ============================================
// File: crates/orbitguard-server/src/services/rate_limiter.rs
// ============================================
//! # Rate Limiter / Flood Detector
//!
//! ## Creation Reason
//! Tracks recent arrivals per source IP and permanently blocks any source
//! that sends more than the threshold within the sliding window.
//!
//! ## Main Functionality
//! - `RateLimiter::admit`: Atomic per-source check-and-record
//! - `RateLimiter::is_blocked`: Cheap blocklist lookup for the fast path
//! - Capacity management for the per-source table
//!
//! ## Admission Algorithm
//! ```text
//! admit(source, now):
//!   blocked?                       → Blocked (window untouched)
//!   drop arrivals with age ≥ W
//!   len(arrivals) ≥ T              → Flooded, blocked = true
//!   arrivals.push(now)             → Admitted
//!
//! T = 15, W = 10s:  arrivals 1..=15 admitted, arrival 16 → Flooded
//! ```
//!
//! ## Sliding Window Approximation
//! This counts raw arrivals in the trailing window, it is not a token
//! bucket. A burst straddling the window edge is judged against whichever
//! arrivals are still inside `W` at that instant, so two bursts of `T` each
//! separated by just over `W` are both admitted.
//!
//! ## ⚠️ Important Note for Next Developer
//! - The whole check-and-record runs under the DashMap shard lock for the
//!   source; two concurrent arrivals can never both slip under the threshold
//! - Never iterate or `retain` the map while holding an entry guard (deadlock)
//! - Blocked sources are never evicted and stay blocked for the process lifetime
//!
//! ## Last Modified
//! v0.1.0 - Initial flood detector

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::{debug, warn};

use orbitguard_common::time::Clock;
use orbitguard_common::types::SourceAddr;

// ============================================
// Admission
// ============================================

/// Result of one `admit` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Arrival recorded; `in_window` counts it.
    Admitted {
        /// Arrivals now inside the window
        in_window: usize,
    },
    /// Threshold reached; the source is now blocked.
    Flooded {
        /// Arrivals inside the window including this one
        count: usize,
    },
    /// Source was already blocked.
    Blocked,
}

impl Admission {
    /// Returns `true` if the arrival was admitted.
    #[must_use]
    pub const fn is_admitted(&self) -> bool {
        matches!(self, Self::Admitted { .. })
    }
}

// ============================================
// SourceState
// ============================================

#[derive(Debug)]
struct SourceState {
    arrivals: VecDeque<Instant>,
    blocked: bool,
    last_seen: Instant,
}

impl SourceState {
    fn new(now: Instant) -> Self {
        Self {
            arrivals: VecDeque::new(),
            blocked: false,
            last_seen: now,
        }
    }

    fn evict_older_than(&mut self, window: Duration, now: Instant) {
        while let Some(&oldest) = self.arrivals.front() {
            if now.saturating_duration_since(oldest) >= window {
                self.arrivals.pop_front();
            } else {
                break;
            }
        }
    }
}

// ============================================
// RateLimiter
// ============================================

/// Per-source sliding-window flood detector with a permanent blocklist.
pub struct RateLimiter {
    sources: DashMap<SourceAddr, SourceState>,
    window: Duration,
    threshold: usize,
    max_tracked: usize,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    /// Creates a limiter admitting `threshold` arrivals per `window`.
    #[must_use]
    pub fn new(window: Duration, threshold: usize, max_tracked: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            sources: DashMap::new(),
            window,
            threshold,
            max_tracked: max_tracked.max(1),
            clock,
        }
    }

    /// Returns `true` if `source` is blocked.
    #[must_use]
    pub fn is_blocked(&self, source: &SourceAddr) -> bool {
        self.sources.get(source).is_some_and(|s| s.blocked)
    }

    /// Records an arrival from `source` at the clock's current instant.
    pub fn admit(&self, source: SourceAddr) -> Admission {
        self.admit_at(source, self.clock.now())
    }

    /// Records an arrival from `source` at `now`.
    pub fn admit_at(&self, source: SourceAddr, now: Instant) -> Admission {
        if !self.sources.contains_key(&source) {
            self.make_room(now);
        }

        let mut entry = self
            .sources
            .entry(source)
            .or_insert_with(|| SourceState::new(now));
        let state = entry.value_mut();
        state.last_seen = now;

        if state.blocked {
            return Admission::Blocked;
        }

        state.evict_older_than(self.window, now);

        if state.arrivals.len() >= self.threshold {
            let count = state.arrivals.len() + 1;
            state.blocked = true;
            state.arrivals.clear();
            warn!(source = %source, count, "Source blocked for flooding");
            return Admission::Flooded { count };
        }

        state.arrivals.push_back(now);
        Admission::Admitted {
            in_window: state.arrivals.len(),
        }
    }

    /// Returns how many arrivals from `source` are inside the window now.
    #[must_use]
    pub fn in_window(&self, source: &SourceAddr) -> usize {
        let now = self.clock.now();
        self.sources.get(source).map_or(0, |s| {
            s.arrivals
                .iter()
                .filter(|&&t| now.saturating_duration_since(t) < self.window)
                .count()
        })
    }

    /// Returns the number of blocked sources.
    #[must_use]
    pub fn blocked_count(&self) -> usize {
        self.sources.iter().filter(|e| e.value().blocked).count()
    }

    /// Returns the number of tracked sources.
    #[must_use]
    pub fn tracked_count(&self) -> usize {
        self.sources.len()
    }

    /// Frees a slot when the table is full: idle sources first, then the
    /// least recently seen unblocked source.
    fn make_room(&self, now: Instant) {
        if self.sources.len() < self.max_tracked {
            return;
        }

        let window = self.window;
        let before = self.sources.len();
        self.sources
            .retain(|_, s| s.blocked || now.saturating_duration_since(s.last_seen) < window);
        let dropped = before.saturating_sub(self.sources.len());
        if dropped > 0 {
            debug!(dropped, "Dropped idle source state");
        }

        if self.sources.len() < self.max_tracked {
            return;
        }

        let victim = self
            .sources
            .iter()
            .filter(|e| !e.value().blocked)
            .min_by_key(|e| e.value().last_seen)
            .map(|e| *e.key());

        match victim {
            Some(victim) => {
                self.sources.remove(&victim);
                debug!(source = %victim, "Evicted least recently seen source");
            }
            None => warn!(
                tracked = self.sources.len(),
                "Source table full of blocked sources, growing past limit"
            ),
        }
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("tracked", &self.tracked_count())
            .field("window", &self.window)
            .field("threshold", &self.threshold)
            .field("max_tracked", &self.max_tracked)
            .finish()
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use orbitguard_common::time::ManualClock;

    fn limiter(threshold: usize, max_tracked: usize) -> (RateLimiter, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let limiter = RateLimiter::new(
            Duration::from_secs(10),
            threshold,
            max_tracked,
            Arc::clone(&clock) as Arc<dyn Clock>,
        );
        (limiter, clock)
    }

    fn ip(s: &str) -> SourceAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_sixteen_in_one_second() {
        let (limiter, clock) = limiter(15, 100);
        let source = ip("10.0.0.5");

        for i in 1..=15 {
            assert_eq!(
                limiter.admit(source),
                Admission::Admitted { in_window: i },
                "arrival {i} should be admitted"
            );
            clock.advance(Duration::from_millis(60));
        }

        assert_eq!(limiter.admit(source), Admission::Flooded { count: 16 });
        assert!(limiter.is_blocked(&source));
    }

    #[test]
    fn test_block_is_permanent_and_idempotent() {
        let (limiter, clock) = limiter(2, 100);
        let source = ip("10.0.0.5");

        limiter.admit(source);
        limiter.admit(source);
        assert!(matches!(limiter.admit(source), Admission::Flooded { .. }));

        clock.advance(Duration::from_secs(3600));
        for _ in 0..5 {
            assert_eq!(limiter.admit(source), Admission::Blocked);
        }
        assert!(limiter.is_blocked(&source));
        assert_eq!(limiter.blocked_count(), 1);
    }

    #[test]
    fn test_threshold_per_window_never_floods() {
        let (limiter, clock) = limiter(15, 100);
        let source = ip("10.0.0.6");

        for _ in 0..5 {
            for _ in 0..15 {
                assert!(limiter.admit(source).is_admitted());
            }
            clock.advance(Duration::from_secs(10));
        }
        assert!(!limiter.is_blocked(&source));
    }

    #[test]
    fn test_window_slides() {
        let (limiter, clock) = limiter(3, 100);
        let source = ip("10.0.0.7");

        limiter.admit(source);
        clock.advance(Duration::from_secs(6));
        limiter.admit(source);
        limiter.admit(source);
        assert_eq!(limiter.in_window(&source), 3);

        clock.advance(Duration::from_secs(5));
        assert_eq!(limiter.in_window(&source), 2);
        assert_eq!(limiter.admit(source), Admission::Admitted { in_window: 3 });
    }

    #[test]
    fn test_sources_are_independent() {
        let (limiter, _clock) = limiter(1, 100);
        assert!(limiter.admit(ip("10.0.0.1")).is_admitted());
        assert!(limiter.admit(ip("10.0.0.2")).is_admitted());
        assert!(matches!(limiter.admit(ip("10.0.0.1")), Admission::Flooded { .. }));
        assert!(!limiter.is_blocked(&ip("10.0.0.2")));
    }

    #[test]
    fn test_capacity_evicts_idle_then_lru_but_never_blocked() {
        let (limiter, clock) = limiter(1, 3);

        let blocked = ip("10.0.0.1");
        limiter.admit(blocked);
        limiter.admit(blocked);
        assert!(limiter.is_blocked(&blocked));

        limiter.admit(ip("10.0.0.2"));
        clock.advance(Duration::from_secs(1));
        limiter.admit(ip("10.0.0.3"));
        assert_eq!(limiter.tracked_count(), 3);

        clock.advance(Duration::from_secs(1));
        limiter.admit(ip("10.0.0.4"));
        assert_eq!(limiter.tracked_count(), 3);
        assert!(limiter.is_blocked(&blocked));
        assert_eq!(limiter.in_window(&ip("10.0.0.2")), 0);
        assert_eq!(limiter.in_window(&ip("10.0.0.3")), 1);

        clock.advance(Duration::from_secs(20));
        limiter.admit(ip("10.0.0.5"));
        assert_eq!(limiter.tracked_count(), 2);
        assert!(limiter.is_blocked(&blocked));
    }

    #[test]
    fn test_concurrent_arrivals_respect_threshold() {
        let (limiter, _clock) = limiter(15, 100);
        let limiter = Arc::new(limiter);
        let source = ip("10.0.0.9");

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                std::thread::spawn(move || {
                    (0..4).filter(|_| limiter.admit(source).is_admitted()).count()
                })
            })
            .collect();
        let admitted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();

        assert_eq!(admitted, 15);
        assert!(limiter.is_blocked(&source));
    }
}
