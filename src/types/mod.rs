//! Shared data types for the daemon and the CLI.
//!
//! This module defines:
//! - The display mode selector shared by `pin` and `watch`
//! - IPC request/response serialization
//! - Events pushed to subscribers
//! - The state snapshot returned by the daemon and read by pollers

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::daemon::pomodoro::{PomodoroSettings, PomodoroState, SessionType};
use crate::daemon::stopwatch::StopwatchState;
use crate::daemon::store::{keys, record_or_default};
use crate::daemon::timer::TimerState;

// ============================================================================
// Mode
// ============================================================================

/// One of the three timing utilities.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Timer,
    Stopwatch,
    Pomodoro,
}

impl Mode {
    /// All modes, in display order.
    pub const ALL: [Mode; 3] = [Mode::Timer, Mode::Stopwatch, Mode::Pomodoro];

    /// Returns the string representation of the mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Timer => "timer",
            Mode::Stopwatch => "stopwatch",
            Mode::Pomodoro => "pomodoro",
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Snapshot
// ============================================================================

/// Every persisted record at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Snapshot {
    pub timer_state: TimerState,
    pub stopwatch_state: StopwatchState,
    pub pomodoro_state: PomodoroState,
    pub pomodoro_settings: PomodoroSettings,
    pub pinned_timer_type: Mode,
}

impl Snapshot {
    /// Builds a snapshot from a store document. Missing keys read as defaults.
    pub fn from_document(document: &Map<String, Value>) -> Self {
        Self {
            timer_state: record_or_default(document, keys::TIMER_STATE),
            stopwatch_state: record_or_default(document, keys::STOPWATCH_STATE),
            pomodoro_state: record_or_default(document, keys::POMODORO_STATE),
            pomodoro_settings: record_or_default(document, keys::POMODORO_SETTINGS),
            pinned_timer_type: record_or_default(document, keys::PINNED_TIMER_TYPE),
        }
    }

    /// Returns true if `mode` is counting.
    pub fn is_running(&self, mode: Mode) -> bool {
        match mode {
            Mode::Timer => self.timer_state.is_running,
            Mode::Stopwatch => self.stopwatch_state.is_running,
            Mode::Pomodoro => self.pomodoro_state.is_running,
        }
    }
}

// ============================================================================
// IPC Types
// ============================================================================

/// IPC request from client to daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum IpcRequest {
    /// Start the countdown timer
    StartTimer {
        /// Duration in seconds
        duration: u64,
    },
    PauseTimer,
    ResetTimer,
    StartStopwatch,
    PauseStopwatch,
    ResetStopwatch,
    StartPomodoro,
    PausePomodoro,
    ResetPomodoro,
    /// Replace the Pomodoro durations
    UpdatePomodoroSettings { settings: PomodoroSettings },
    /// Choose the mode shown by the compact display
    SetPinnedMode { mode: Mode },
    /// Query every record
    Status,
    /// Keep the connection open and stream events
    Subscribe,
}

/// IPC response from daemon to client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpcResponse {
    /// Response status ("success" or "error")
    pub status: String,
    /// Human-readable message
    pub message: String,
    /// State after the command
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Snapshot>,
}

impl IpcResponse {
    /// Creates a success response.
    pub fn success(message: impl Into<String>, data: Option<Snapshot>) -> Self {
        Self {
            status: "success".to_string(),
            message: message.into(),
            data,
        }
    }

    /// Creates an error response.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
            data: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}

// ============================================================================
// DaemonEvent
// ============================================================================

/// Events pushed to subscribers when a wake is handled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum DaemonEvent {
    /// The countdown timer reached zero
    TimerComplete,
    /// A Pomodoro session ended and the next one started
    PomodoroSessionChange {
        #[serde(rename = "sessionType")]
        session_type: SessionType,
        cycle: u32,
    },
}

// ============================================================================
// Tests
// ============================================================================
