//! Timekeeping primitives.
//!
//! Every mode stores absolute wall-clock timestamps (milliseconds since the
//! Unix epoch) and derives remaining/elapsed time from them on demand. Nothing
//! here counts ticks, so a suspended or restarted daemon picks up exactly where
//! the wall clock says it should be.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;

// ============================================================================
// Pure computations
// ============================================================================

/// Whole seconds left until `end_time_ms`, rounded up.
///
/// Returns exactly 0 once `now_ms` has reached or passed the end time.
pub fn remaining_seconds(end_time_ms: i64, now_ms: i64) -> u64 {
    if end_time_ms <= now_ms {
        return 0;
    }
    let diff = end_time_ms.saturating_sub(now_ms) as u64;
    diff.div_ceil(1000)
}

/// Milliseconds elapsed since `start_time_ms`.
///
/// A start time in the future (clock stepped backwards) yields 0.
pub fn elapsed_ms(start_time_ms: i64, now_ms: i64) -> u64 {
    now_ms.saturating_sub(start_time_ms).max(0) as u64
}

/// Absolute end time for a countdown of `seconds` starting at `now_ms`.
pub fn deadline_after(now_ms: i64, seconds: u64) -> i64 {
    let span = i64::try_from(seconds.saturating_mul(1000)).unwrap_or(i64::MAX);
    now_ms.saturating_add(span)
}

// ============================================================================
// Clock
// ============================================================================

/// Source of the current wall-clock time.
///
/// Must be a real-time clock: persisted timestamps are compared against it
/// after the daemon restarts, which a monotonic clock cannot do.
pub trait Clock: Send + Sync {
    /// Milliseconds since the Unix epoch.
    fn now_ms(&self) -> i64;
}

/// Clock backed by the system's real-time clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Manually driven clock for tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    #[must_use]
    pub fn new(start_ms: i64) -> Self {
        Self {
            now: AtomicI64::new(start_ms),
        }
    }

    pub fn set(&self, now_ms: i64) {
        self.now.store(now_ms, Ordering::SeqCst);
    }

    pub fn advance(&self, ms: i64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    mod remaining_tests {
        use super::*;

        #[test]
        fn test_exact_seconds() {
            assert_eq!(remaining_seconds(10_000, 0), 10);
        }

        #[test]
        fn test_rounds_up_partial_second() {
            assert_eq!(remaining_seconds(10_000, 1), 10);
            assert_eq!(remaining_seconds(10_000, 999), 10);
            assert_eq!(remaining_seconds(10_000, 1_000), 9);
            assert_eq!(remaining_seconds(10_000, 9_999), 1);
        }

        #[test]
        fn test_zero_at_or_after_end() {
            assert_eq!(remaining_seconds(5_000, 5_000), 0);
            assert_eq!(remaining_seconds(5_000, 5_001), 0);
            assert_eq!(remaining_seconds(5_000, 1_000_000), 0);
        }

        #[test]
        fn test_extreme_timestamps_do_not_overflow() {
            assert_eq!(remaining_seconds(i64::MAX, i64::MIN), 9_223_372_036_854_776);
            assert_eq!(remaining_seconds(i64::MAX, 0), 9_223_372_036_854_776);
            assert_eq!(remaining_seconds(i64::MIN, i64::MAX), 0);
        }

        #[test]
        fn test_monotonic_in_now() {
            let end = 60_000;
            let mut previous = u64::MAX;
            for now in (0..=70_000).step_by(137) {
                let remaining = remaining_seconds(end, now);
                assert!(remaining <= previous, "went up at now={}", now);
                previous = remaining;
            }
        }
    }

    mod elapsed_tests {
        use super::*;

        #[test]
        fn test_keeps_millisecond_precision() {
            assert_eq!(elapsed_ms(1_000, 2_234), 1_234);
        }

        #[test]
        fn test_future_start_is_zero() {
            assert_eq!(elapsed_ms(5_000, 4_000), 0);
        }
    }

    #[test]
    fn test_deadline_after() {
        assert_eq!(deadline_after(1_000, 5), 6_000);
        assert_eq!(deadline_after(0, u64::MAX), i64::MAX);
    }

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new(100);
        assert_eq!(clock.now_ms(), 100);
        clock.advance(50);
        assert_eq!(clock.now_ms(), 150);
        clock.set(10);
        assert_eq!(clock.now_ms(), 10);
    }

    #[test]
    fn test_system_clock_is_wall_clock() {
        // Any date after 2020-01-01 rules out a monotonic uptime counter.
        assert!(SystemClock.now_ms() > 1_577_836_800_000);
    }
}
