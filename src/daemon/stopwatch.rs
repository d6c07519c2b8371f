//! Stopwatch state machine.
//!
//! Elapsed time is carried across pauses by rebasing `start_time`:
//! `start_time = now - paused_elapsed` on every start.

use serde::{Deserialize, Serialize};

use super::timekeeping::elapsed_ms;

/// Persisted stopwatch record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StopwatchState {
    /// Elapsed milliseconds as of the last write
    pub elapsed_ms: u64,
    /// Whether the stopwatch is counting
    pub is_running: bool,
    /// Rebased start time in ms, present only while running
    pub start_time: Option<i64>,
    /// Elapsed baseline carried across pause/resume
    pub paused_elapsed: u64,
}

impl StopwatchState {
    /// Starts or resumes counting. Returns false if already running.
    pub fn start(&mut self, now_ms: i64) -> bool {
        if self.is_running {
            return false;
        }

        let baseline = i64::try_from(self.paused_elapsed).unwrap_or(i64::MAX);
        self.start_time = Some(now_ms.saturating_sub(baseline));
        self.elapsed_ms = self.paused_elapsed;
        self.is_running = true;
        true
    }

    /// Stops counting and records the elapsed time as the new baseline.
    ///
    /// Returns false (and changes nothing) unless the stopwatch was running.
    pub fn pause(&mut self, now_ms: i64) -> bool {
        if !self.is_running {
            return false;
        }

        let elapsed = self.current_elapsed(now_ms);
        self.elapsed_ms = elapsed;
        self.paused_elapsed = elapsed;
        self.is_running = false;
        self.start_time = None;
        true
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Rewrites `elapsed_ms` from `start_time`. Returns true while running.
    pub fn refresh(&mut self, now_ms: i64) -> bool {
        if !self.is_running {
            return false;
        }
        self.elapsed_ms = self.current_elapsed(now_ms);
        true
    }

    /// Elapsed milliseconds computed against `now_ms`.
    pub fn current_elapsed(&self, now_ms: i64) -> u64 {
        match (self.is_running, self.start_time) {
            (true, Some(start_time)) => elapsed_ms(start_time, now_ms),
            _ => self.elapsed_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T: i64 = 1_700_000_000_000;

    #[test]
    fn test_start_from_idle() {
        let mut state = StopwatchState::default();
        assert!(state.start(T));

        assert!(state.is_running);
        assert_eq!(state.start_time, Some(T));
        assert_eq!(state.elapsed_ms, 0);
    }

    #[test]
    fn test_start_when_running_is_noop() {
        let mut state = StopwatchState::default();
        state.start(T);
        assert!(!state.start(T + 5_000));
        assert_eq!(state.start_time, Some(T));
    }

    #[test]
    fn test_pause_records_elapsed() {
        let mut state = StopwatchState::default();
        state.start(T);
        assert!(state.pause(T + 1_234));

        assert!(!state.is_running);
        assert_eq!(state.elapsed_ms, 1_234);
        assert_eq!(state.paused_elapsed, 1_234);
        assert!(state.start_time.is_none());
    }

    #[test]
    fn test_pause_when_idle_is_noop() {
        let mut state = StopwatchState::default();
        assert!(!state.pause(T));
        assert_eq!(state, StopwatchState::default());
    }

    #[test]
    fn test_elapsed_sums_running_intervals() {
        let mut state = StopwatchState::default();
        let mut now = T;
        let mut expected = 0u64;

        for (running, idle) in [(1_500u64, 10_000u64), (250, 3), (42_000, 999), (1, 60_000)] {
            state.start(now);
            now += running as i64;
            state.pause(now);
            expected += running;
            assert_eq!(state.elapsed_ms, expected);

            now += idle as i64;
        }

        assert_eq!(state.paused_elapsed, expected);
    }

    #[test]
    fn test_resume_rebases_start_time() {
        let mut state = StopwatchState::default();
        state.start(T);
        state.pause(T + 2_000);
        state.start(T + 10_000);

        assert_eq!(state.start_time, Some(T + 8_000));
        assert_eq!(state.elapsed_ms, 2_000);
        assert_eq!(state.current_elapsed(T + 10_500), 2_500);
    }

    #[test]
    fn test_refresh() {
        let mut state = StopwatchState::default();
        assert!(!state.refresh(T));

        state.start(T);
        assert!(state.refresh(T + 10));
        assert_eq!(state.elapsed_ms, 10);
    }

    #[test]
    fn test_reset_is_idempotent() {
        let mut state = StopwatchState::default();
        state.start(T);
        state.pause(T + 5_000);

        state.reset();
        let once = state.clone();
        state.reset();

        assert_eq!(state, once);
        assert_eq!(state, StopwatchState::default());
    }

    #[test]
    fn test_serialized_shape() {
        let json = serde_json::to_string(&StopwatchState::default()).unwrap();
        assert_eq!(
            json,
            r#"{"elapsedMs":0,"isRunning":false,"startTime":null,"pausedElapsed":0}"#
        );
    }
}
