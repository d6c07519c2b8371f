//! timekeeper library
//!
//! This library provides the core functionality for the timekeeper CLI.
//! It includes:
//! - Countdown timer, stopwatch and Pomodoro state machines that derive
//!   remaining/elapsed time from stored wall-clock timestamps
//! - A background daemon with an atomic JSON state store and scheduled wakes
//! - IPC server/client for daemon-CLI communication
//! - CLI command parsing, display utilities and the display poller
//! - Desktop notifications

pub mod cli;
pub mod config;
pub mod daemon;
pub mod notification;
pub mod types;

// Re-export commonly used types for convenience
pub use config::Config;
pub use daemon::pomodoro::{PomodoroSettings, PomodoroState, SessionType};
pub use daemon::stopwatch::StopwatchState;
pub use daemon::timer::TimerState;
pub use types::{DaemonEvent, IpcRequest, IpcResponse, Mode, Snapshot};

pub use notification::{
    DesktopNotifier, MockNotifier, NotificationContent, NotificationError, Notifier,
};
