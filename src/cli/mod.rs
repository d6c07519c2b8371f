//! CLI module for timekeeper.
//!
//! This module provides the command-line interface:
//! - `commands`: Command definitions using clap derive
//! - `client`: IPC client for daemon communication
//! - `display`: Output formatting and display logic
//! - `poller`: Periodic state-file reader behind `watch`

pub mod client;
pub mod commands;
pub mod display;
pub mod poller;

pub use client::{EventStream, IpcClient};
pub use commands::{
    Cli, Commands, PomodoroAction, SettingsArgs, StopwatchAction, TimerAction, WatchArgs,
};
pub use display::Display;
pub use poller::DisplayPoller;
