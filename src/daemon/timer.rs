//! Countdown timer state machine.
//!
//! State transitions (Idle / Running / Paused) are pure functions of the
//! stored record and the current wall-clock time. Persistence, wakes and
//! notifications are driven by the engine.

use serde::{Deserialize, Serialize};

use super::error::EngineError;
use super::timekeeping::{deadline_after, remaining_seconds};

// ============================================================================
// TimerStatus
// ============================================================================

/// Derived lifecycle status of the countdown timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerStatus {
    /// Nothing on the clock
    Idle,
    /// Counting down towards `end_time`
    Running,
    /// Stopped with time left
    Paused,
}

impl TimerStatus {
    /// Returns the string representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            TimerStatus::Idle => "idle",
            TimerStatus::Running => "running",
            TimerStatus::Paused => "paused",
        }
    }
}

// ============================================================================
// TimerState
// ============================================================================

/// Persisted countdown timer record.
///
/// While running, `remaining_seconds` is only as fresh as the last write;
/// `end_time` is authoritative.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimerState {
    /// Remaining seconds as of the last write
    pub remaining_seconds: u64,
    /// Whether the countdown is active
    pub is_running: bool,
    /// Absolute end time in ms, present only while running
    pub end_time: Option<i64>,
}

impl TimerState {
    /// Returns the derived status.
    pub fn status(&self) -> TimerStatus {
        if self.is_running {
            TimerStatus::Running
        } else if self.remaining_seconds > 0 {
            TimerStatus::Paused
        } else {
            TimerStatus::Idle
        }
    }

    /// Starts a countdown of `duration_secs`.
    ///
    /// Returns the absolute end time to arm the wake for. Starting while
    /// already running restarts the countdown with the new duration.
    ///
    /// # Errors
    ///
    /// Returns `InvalidDuration` if `duration_secs` is zero.
    pub fn start(&mut self, duration_secs: u64, now_ms: i64) -> Result<i64, EngineError> {
        if duration_secs == 0 {
            return Err(EngineError::InvalidDuration);
        }

        let end_time = deadline_after(now_ms, duration_secs);
        self.remaining_seconds = duration_secs;
        self.is_running = true;
        self.end_time = Some(end_time);
        Ok(end_time)
    }

    /// Freezes the countdown.
    ///
    /// Returns false (and changes nothing) unless the timer was running.
    pub fn pause(&mut self, now_ms: i64) -> bool {
        if !self.is_running {
            return false;
        }

        self.remaining_seconds = self.current_remaining(now_ms);
        self.is_running = false;
        self.end_time = None;
        true
    }

    /// Clears the timer back to idle.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Marks the countdown finished. Called when the wake fires.
    pub fn complete(&mut self) {
        self.reset();
    }

    /// Rewrites `remaining_seconds` from `end_time`.
    ///
    /// Returns true while there is still time left to refresh.
    pub fn refresh(&mut self, now_ms: i64) -> bool {
        if !self.is_running {
            return false;
        }
        self.remaining_seconds = self.current_remaining(now_ms);
        self.remaining_seconds > 0
    }

    /// Remaining seconds computed against `now_ms`.
    pub fn current_remaining(&self, now_ms: i64) -> u64 {
        match (self.is_running, self.end_time) {
            (true, Some(end_time)) => remaining_seconds(end_time, now_ms),
            _ => self.remaining_seconds,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const T: i64 = 1_700_000_000_000;

    #[test]
    fn test_default_is_idle() {
        let state = TimerState::default();
        assert_eq!(state.status(), TimerStatus::Idle);
        assert_eq!(state.remaining_seconds, 0);
        assert!(state.end_time.is_none());
    }

    #[test]
    fn test_start_sets_end_time() {
        let mut state = TimerState::default();
        let end = state.start(5, T).unwrap();

        assert_eq!(end, T + 5_000);
        assert_eq!(state.status(), TimerStatus::Running);
        assert_eq!(state.remaining_seconds, 5);
        assert_eq!(state.end_time, Some(T + 5_000));
    }

    #[test]
    fn test_start_rejects_zero() {
        let mut state = TimerState::default();
        assert_eq!(state.start(0, T), Err(EngineError::InvalidDuration));
        assert_eq!(state, TimerState::default());
    }

    #[test]
    fn test_start_then_pause_within_one_second() {
        for duration in [1, 2, 59, 60, 3_599, 86_400] {
            for delay in [0, 1, 500, 999] {
                let mut state = TimerState::default();
                state.start(duration, T).unwrap();
                state.pause(T + delay);
                let diff = duration.abs_diff(state.remaining_seconds);
                assert!(diff <= 1, "duration={} delay={}", duration, delay);
            }
        }
    }

    #[test]
    fn test_pause_freezes_remaining() {
        let mut state = TimerState::default();
        state.start(10, T).unwrap();

        assert!(state.pause(T + 3_500));

        assert_eq!(state.status(), TimerStatus::Paused);
        assert_eq!(state.remaining_seconds, 7);
        assert!(state.end_time.is_none());
        // Frozen: later reads do not move.
        assert_eq!(state.current_remaining(T + 60_000), 7);
    }

    #[test]
    fn test_pause_when_not_running_is_noop() {
        let mut state = TimerState {
            remaining_seconds: 42,
            ..Default::default()
        };
        assert!(!state.pause(T));
        assert_eq!(state.remaining_seconds, 42);
        assert_eq!(state.status(), TimerStatus::Paused);
    }

    #[test]
    fn test_resume_from_paused() {
        let mut state = TimerState::default();
        state.start(10, T).unwrap();
        state.pause(T + 4_000);

        let remaining = state.remaining_seconds;
        let end = state.start(remaining, T + 20_000).unwrap();
        assert_eq!(end, T + 20_000 + 6_000);
    }

    #[test]
    fn test_reset_is_idempotent() {
        let mut state = TimerState::default();
        state.start(30, T).unwrap();

        state.reset();
        let once = state.clone();
        state.reset();

        assert_eq!(state, once);
        assert_eq!(state.status(), TimerStatus::Idle);
    }

    #[test]
    fn test_complete() {
        let mut state = TimerState::default();
        state.start(5, T).unwrap();
        state.complete();

        assert_eq!(state.remaining_seconds, 0);
        assert!(!state.is_running);
        assert!(state.end_time.is_none());
    }

    #[test]
    fn test_refresh_until_zero() {
        let mut state = TimerState::default();
        state.start(5, T).unwrap();

        assert!(state.refresh(T + 1_000));
        assert!(matches!(state.remaining_seconds, 4 | 5));

        assert!(!state.refresh(T + 5_000));
        assert_eq!(state.remaining_seconds, 0);
        // Still running until the wake finalizes it.
        assert!(state.is_running);
    }

    #[test]
    fn test_refresh_ignored_when_paused() {
        let mut state = TimerState {
            remaining_seconds: 9,
            ..Default::default()
        };
        assert!(!state.refresh(T));
        assert_eq!(state.remaining_seconds, 9);
    }

    #[test]
    fn test_serialized_shape() {
        let mut state = TimerState::default();
        state.start(5, 1_000).unwrap();

        let json = serde_json::to_string(&state).unwrap();
        assert_eq!(
            json,
            r#"{"remainingSeconds":5,"isRunning":true,"endTime":6000}"#
        );

        let idle: TimerState =
            serde_json::from_str(r#"{"remainingSeconds":0,"isRunning":false,"endTime":null}"#)
                .unwrap();
        assert_eq!(idle, TimerState::default());
    }

    #[test]
    fn test_deserialize_partial_record() {
        let state: TimerState = serde_json::from_str(r#"{"remainingSeconds":12}"#).unwrap();
        assert_eq!(state.remaining_seconds, 12);
        assert!(!state.is_running);
    }
}
