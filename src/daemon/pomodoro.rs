//! Pomodoro cycle state machine.
//!
//! Sessions chain automatically: each completed session immediately starts
//! the next one. After four work sessions the break is a long one and the
//! cycle counter starts over.

use serde::{Deserialize, Serialize};

use super::error::EngineError;
use super::timekeeping::{deadline_after, remaining_seconds};

/// Work sessions per long-break cycle.
pub const SESSIONS_PER_CYCLE: u32 = 4;

// ============================================================================
// SessionType
// ============================================================================

/// The current Pomodoro phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionType {
    /// Focused work
    #[default]
    #[serde(rename = "Work Session")]
    WorkSession,
    /// Break between work sessions
    #[serde(rename = "Short Break")]
    ShortBreak,
    /// Break after a full cycle
    #[serde(rename = "Long Break")]
    LongBreak,
}

impl SessionType {
    /// Returns the display name of the session type.
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionType::WorkSession => "Work Session",
            SessionType::ShortBreak => "Short Break",
            SessionType::LongBreak => "Long Break",
        }
    }
}

impl std::fmt::Display for SessionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// PomodoroSettings
// ============================================================================

/// Session durations in minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PomodoroSettings {
    /// Work session length (1-180)
    pub work_duration: u32,
    /// Short break length (1-180)
    pub short_break_duration: u32,
    /// Long break length (1-180)
    pub long_break_duration: u32,
}

impl Default for PomodoroSettings {
    fn default() -> Self {
        Self {
            work_duration: 25,
            short_break_duration: 5,
            long_break_duration: 15,
        }
    }
}

impl PomodoroSettings {
    /// Longest accepted duration in minutes.
    pub const MAX_MINUTES: u32 = 180;

    pub fn with_work_duration(mut self, minutes: u32) -> Self {
        self.work_duration = minutes;
        self
    }

    pub fn with_short_break_duration(mut self, minutes: u32) -> Self {
        self.short_break_duration = minutes;
        self
    }

    pub fn with_long_break_duration(mut self, minutes: u32) -> Self {
        self.long_break_duration = minutes;
        self
    }

    /// Validates the settings.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSettings` naming the first out-of-range field.
    pub fn validate(&self) -> Result<(), EngineError> {
        let fields = [
            ("作業時間", self.work_duration),
            ("短い休憩時間", self.short_break_duration),
            ("長い休憩時間", self.long_break_duration),
        ];
        for (field, minutes) in fields {
            if !(1..=Self::MAX_MINUTES).contains(&minutes) {
                return Err(EngineError::InvalidSettings {
                    field,
                    min: 1,
                    max: Self::MAX_MINUTES,
                });
            }
        }
        Ok(())
    }

    /// Length of a session of the given type, in seconds.
    pub fn duration_secs(&self, session_type: SessionType) -> u64 {
        let minutes = match session_type {
            SessionType::WorkSession => self.work_duration,
            SessionType::ShortBreak => self.short_break_duration,
            SessionType::LongBreak => self.long_break_duration,
        };
        u64::from(minutes) * 60
    }
}

// ============================================================================
// PomodoroState
// ============================================================================

/// Persisted Pomodoro record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PomodoroState {
    /// Remaining seconds as of the last write
    pub remaining_seconds: u64,
    /// Current phase
    pub session_type: SessionType,
    /// Work session number within the current cycle (1-4)
    pub cycle: u32,
    /// Whether the session clock is running
    pub is_running: bool,
    /// Absolute end time in ms, present only while running
    pub end_time: Option<i64>,
}

impl Default for PomodoroState {
    fn default() -> Self {
        Self::fresh(&PomodoroSettings::default())
    }
}

impl PomodoroState {
    /// An idle first work session sized from `settings`.
    pub fn fresh(settings: &PomodoroSettings) -> Self {
        Self {
            remaining_seconds: settings.duration_secs(SessionType::WorkSession),
            session_type: SessionType::WorkSession,
            cycle: 1,
            is_running: false,
            end_time: None,
        }
    }

    /// Starts or resumes the current session from the stored remaining time.
    ///
    /// Returns the end time to arm the wake for, or `None` if the session
    /// was already running.
    pub fn start(&mut self, now_ms: i64, settings: &PomodoroSettings) -> Option<i64> {
        if self.is_running {
            return None;
        }

        if self.remaining_seconds == 0 {
            self.remaining_seconds = settings.duration_secs(self.session_type);
        }

        let end_time = deadline_after(now_ms, self.remaining_seconds);
        self.is_running = true;
        self.end_time = Some(end_time);
        Some(end_time)
    }

    /// Freezes the current session. Returns false unless it was running.
    pub fn pause(&mut self, now_ms: i64) -> bool {
        if !self.is_running {
            return false;
        }

        self.remaining_seconds = self.current_remaining(now_ms);
        self.is_running = false;
        self.end_time = None;
        true
    }

    /// Back to an idle first work session.
    pub fn reset(&mut self, settings: &PomodoroSettings) {
        *self = Self::fresh(settings);
    }

    /// Moves to the next session and starts it immediately.
    ///
    /// Exactly one step is taken, however late the call is. Returns the new
    /// end time.
    pub fn advance(&mut self, now_ms: i64, settings: &PomodoroSettings) -> i64 {
        let (next, cycle) = next_session(self.session_type, self.cycle);
        let duration = settings.duration_secs(next);
        let end_time = deadline_after(now_ms, duration);

        self.session_type = next;
        self.cycle = cycle;
        self.remaining_seconds = duration;
        self.is_running = true;
        self.end_time = Some(end_time);
        end_time
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

/// Transition table for session changes.
///
/// Work → Long Break once the cycle is complete (counter back to 1),
/// otherwise Work → Short Break. Short Break → Work bumps the counter;
/// Long Break → Work keeps the already reset counter.
pub fn next_session(current: SessionType, cycle: u32) -> (SessionType, u32) {
    match current {
        SessionType::WorkSession if cycle >= SESSIONS_PER_CYCLE => (SessionType::LongBreak, 1),
        SessionType::WorkSession => (SessionType::ShortBreak, cycle),
        SessionType::ShortBreak => (SessionType::WorkSession, cycle + 1),
        SessionType::LongBreak => (SessionType::WorkSession, cycle),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const T: i64 = 1_700_000_000_000;

    // ------------------------------------------------------------------------
    // SessionType / Settings Tests
    // ------------------------------------------------------------------------

    mod session_type_tests {
        use super::*;

        #[test]
        fn test_serialize_uses_display_names() {
            let json = serde_json::to_string(&SessionType::ShortBreak).unwrap();
            assert_eq!(json, "\"Short Break\"");

            let parsed: SessionType = serde_json::from_str("\"Long Break\"").unwrap();
            assert_eq!(parsed, SessionType::LongBreak);
        }
    }

    mod settings_tests {
        use super::*;

        #[test]
        fn test_default_values() {
            let settings = PomodoroSettings::default();
            assert_eq!(settings.work_duration, 25);
            assert_eq!(settings.short_break_duration, 5);
            assert_eq!(settings.long_break_duration, 15);
            assert!(settings.validate().is_ok());
        }

        #[test]
        fn test_validate_bounds() {
            let ok = PomodoroSettings::default()
                .with_work_duration(1)
                .with_short_break_duration(180)
                .with_long_break_duration(90);
            assert!(ok.validate().is_ok());

            let zero = PomodoroSettings::default().with_work_duration(0);
            assert!(matches!(
                zero.validate(),
                Err(EngineError::InvalidSettings { field: "作業時間", .. })
            ));

            let too_long = PomodoroSettings::default().with_long_break_duration(181);
            assert!(too_long.validate().is_err());
        }

        #[test]
        fn test_duration_secs() {
            let settings = PomodoroSettings::default();
            assert_eq!(settings.duration_secs(SessionType::WorkSession), 1_500);
            assert_eq!(settings.duration_secs(SessionType::ShortBreak), 300);
            assert_eq!(settings.duration_secs(SessionType::LongBreak), 900);
        }

        #[test]
        fn test_serialized_shape() {
            let json = serde_json::to_string(&PomodoroSettings::default()).unwrap();
            assert_eq!(
                json,
                r#"{"workDuration":25,"shortBreakDuration":5,"longBreakDuration":15}"#
            );
        }
    }

    // ------------------------------------------------------------------------
    // PomodoroState Tests
    // ------------------------------------------------------------------------

    mod state_tests {
        use super::*;

        #[test]
        fn test_default_is_fresh_work_session() {
            let state = PomodoroState::default();
            assert_eq!(state.remaining_seconds, 25 * 60);
            assert_eq!(state.session_type, SessionType::WorkSession);
            assert_eq!(state.cycle, 1);
            assert!(!state.is_running);
            assert!(state.end_time.is_none());
        }

        #[test]
        fn test_start_uses_stored_remaining() {
            let settings = PomodoroSettings::default();
            let mut state = PomodoroState {
                remaining_seconds: 100,
                ..PomodoroState::fresh(&settings)
            };

            let end = state.start(T, &settings).unwrap();
            assert_eq!(end, T + 100_000);
            assert!(state.is_running);
        }

        #[test]
        fn test_start_when_running_is_noop() {
            let settings = PomodoroSettings::default();
            let mut state = PomodoroState::fresh(&settings);
            state.start(T, &settings);

            assert!(state.start(T + 1_000, &settings).is_none());
            assert_eq!(state.end_time, Some(T + 1_500_000));
        }

        #[test]
        fn test_start_with_zero_remaining_uses_full_session() {
            let settings = PomodoroSettings::default();
            let mut state = PomodoroState {
                remaining_seconds: 0,
                session_type: SessionType::ShortBreak,
                ..PomodoroState::fresh(&settings)
            };

            let end = state.start(T, &settings).unwrap();
            assert_eq!(end, T + 300_000);
            assert_eq!(state.remaining_seconds, 300);
        }

        #[test]
        fn test_pause_and_resume_keeps_partial_time() {
            let settings = PomodoroSettings::default();
            let mut state = PomodoroState::fresh(&settings);
            state.start(T, &settings);

            assert!(state.pause(T + 60_000));
            assert_eq!(state.remaining_seconds, 1_440);
            assert!(!state.pause(T + 70_000));

            let end = state.start(T + 500_000, &settings).unwrap();
            assert_eq!(end, T + 500_000 + 1_440_000);
        }

        #[test]
        fn test_reset_is_idempotent() {
            let settings = PomodoroSettings::default().with_work_duration(50);
            let mut state = PomodoroState::fresh(&settings);
            state.advance(T, &settings);

            state.reset(&settings);
            let once = state.clone();
            state.reset(&settings);

            assert_eq!(state, once);
            assert_eq!(state.remaining_seconds, 50 * 60);
            assert_eq!(state.cycle, 1);
        }

        #[test]
        fn test_advance_starts_next_session() {
            let settings = PomodoroSettings::default();
            let mut state = PomodoroState::fresh(&settings);

            let end = state.advance(T, &settings);

            assert_eq!(state.session_type, SessionType::ShortBreak);
            assert_eq!(state.remaining_seconds, 300);
            assert!(state.is_running);
            assert_eq!(end, T + 300_000);
            assert_eq!(state.end_time, Some(end));
        }

        #[test]
        fn test_cycle_law() {
            let settings = PomodoroSettings::default();
            let mut state = PomodoroState::fresh(&settings);

            let expected = [
                (SessionType::ShortBreak, 1),
                (SessionType::WorkSession, 2),
                (SessionType::ShortBreak, 2),
                (SessionType::WorkSession, 3),
                (SessionType::ShortBreak, 3),
                (SessionType::WorkSession, 4),
                (SessionType::LongBreak, 1),
                (SessionType::WorkSession, 1),
                (SessionType::ShortBreak, 1),
                (SessionType::WorkSession, 2),
            ];

            let mut now = T;
            for (i, (session_type, cycle)) in expected.into_iter().enumerate() {
                now = state.advance(now, &settings);
                assert_eq!(state.session_type, session_type, "step {}", i);
                assert_eq!(state.cycle, cycle, "step {}", i);
                assert!((1..=SESSIONS_PER_CYCLE).contains(&state.cycle));
            }
        }

        #[test]
        fn test_advance_takes_one_step_when_late() {
            let settings = PomodoroSettings::default();
            let mut state = PomodoroState::fresh(&settings);
            state.start(T, &settings);

            // Woken an hour late: several boundaries missed, one step taken.
            let late = T + 3_600_000;
            let end = state.advance(late, &settings);

            assert_eq!(state.session_type, SessionType::ShortBreak);
            assert_eq!(end, late + 300_000);
        }

        #[test]
        fn test_refresh() {
            let settings = PomodoroSettings::default().with_work_duration(1);
            let mut state = PomodoroState::fresh(&settings);
            assert!(!state.refresh(T));

            state.start(T, &settings);
            assert!(state.refresh(T + 30_500));
            assert_eq!(state.remaining_seconds, 30);
            assert!(!state.refresh(T + 60_000));
            assert_eq!(state.remaining_seconds, 0);
        }

        #[test]
        fn test_serialized_shape() {
            let json = serde_json::to_string(&PomodoroState::default()).unwrap();
            assert_eq!(
                json,
                r#"{"remainingSeconds":1500,"sessionType":"Work Session","cycle":1,"isRunning":false,"endTime":null}"#
            );
        }
    }

    #[test]
    fn test_next_session_table() {
        use SessionType::*;
        assert_eq!(next_session(WorkSession, 1), (ShortBreak, 1));
        assert_eq!(next_session(WorkSession, 3), (ShortBreak, 3));
        assert_eq!(next_session(WorkSession, 4), (LongBreak, 1));
        assert_eq!(next_session(ShortBreak, 3), (WorkSession, 4));
        assert_eq!(next_session(LongBreak, 1), (WorkSession, 1));
    }
}
