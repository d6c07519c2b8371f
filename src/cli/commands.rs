//! Command definitions for the timekeeper CLI.
//!
//! Uses clap derive macro for argument parsing.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::daemon::pomodoro::PomodoroSettings;
use crate::types::Mode;

/// Default countdown for `timer start`, matching the compact display's
/// quick-start button.
pub const DEFAULT_TIMER_SECONDS: u64 = 300;

// ============================================================================
// CLI Structure
// ============================================================================

/// timekeeper - countdown timer, stopwatch and Pomodoro cycle
#[derive(Parser, Debug)]
#[command(
    name = "timekeeper",
    version,
    about = "タイマー・ストップウォッチ・ポモドーロCLI",
    long_about = "バックグラウンドのDaemonが時間を管理するタイマーCLI。\n\
                  ターミナルを閉じてもタイマーは進み続け、時間になるとデスクトップ通知を表示します。",
    propagate_version = true
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable verbose output for debugging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Directory holding the state file and the daemon socket
    #[arg(long, global = true, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,
}

// ============================================================================
// Subcommands
// ============================================================================

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Countdown timer
    Timer {
        #[command(subcommand)]
        action: TimerAction,
    },

    /// Stopwatch
    Stopwatch {
        #[command(subcommand)]
        action: StopwatchAction,
    },

    /// Pomodoro work/break cycle
    Pomodoro {
        #[command(subcommand)]
        action: PomodoroAction,
    },

    /// Show every mode's current state
    Status,

    /// Continuously display one mode
    Watch(WatchArgs),

    /// Choose the mode `watch` shows by default
    Pin {
        #[arg(value_enum)]
        mode: Mode,
    },

    /// Print timer and session events as they happen
    Events,

    /// Run as daemon (background service)
    Daemon {
        /// Log notifications instead of showing them
        #[arg(long)]
        no_notify: bool,
    },

    /// Generate shell completion scripts
    Completions {
        /// Shell type for completion script
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// Countdown timer actions
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum TimerAction {
    /// Start (or restart) the countdown
    Start {
        /// Duration in seconds
        #[arg(
            default_value_t = DEFAULT_TIMER_SECONDS,
            value_parser = clap::value_parser!(u64).range(1..)
        )]
        seconds: u64,
    },
    /// Pause the countdown
    Pause,
    /// Clear the countdown
    Reset,
}

/// Stopwatch actions
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum StopwatchAction {
    /// Start or resume counting
    Start,
    /// Pause counting
    Pause,
    /// Clear the elapsed time
    Reset,
}

/// Pomodoro actions
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum PomodoroAction {
    /// Start or resume the current session
    Start,
    /// Pause the current session
    Pause,
    /// Back to the first work session
    Reset,
    /// Show or change session durations
    Settings(SettingsArgs),
}

// ============================================================================
// Arguments
// ============================================================================

/// Arguments for `pomodoro settings`. Omitted values are kept.
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsArgs {
    /// Work duration in minutes (1-180)
    #[arg(
        short,
        long,
        value_parser = clap::value_parser!(u32).range(1..=PomodoroSettings::MAX_MINUTES as i64)
    )]
    pub work: Option<u32>,

    /// Short break duration in minutes (1-180)
    #[arg(
        short,
        long,
        value_parser = clap::value_parser!(u32).range(1..=PomodoroSettings::MAX_MINUTES as i64)
    )]
    pub short_break: Option<u32>,

    /// Long break duration in minutes (1-180)
    #[arg(
        short,
        long,
        value_parser = clap::value_parser!(u32).range(1..=PomodoroSettings::MAX_MINUTES as i64)
    )]
    pub long_break: Option<u32>,
}

impl SettingsArgs {
    /// Returns true if no duration was given.
    pub fn is_empty(&self) -> bool {
        self.work.is_none() && self.short_break.is_none() && self.long_break.is_none()
    }

    /// Applies the given durations on top of `current`.
    pub fn merge(&self, current: PomodoroSettings) -> PomodoroSettings {
        PomodoroSettings {
            work_duration: self.work.unwrap_or(current.work_duration),
            short_break_duration: self.short_break.unwrap_or(current.short_break_duration),
            long_break_duration: self.long_break.unwrap_or(current.long_break_duration),
        }
    }
}

/// Arguments for `watch`
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchArgs {
    /// Mode to display (defaults to the pinned mode)
    #[arg(value_enum)]
    pub mode: Option<Mode>,

    /// Print a single line and exit
    #[arg(long)]
    pub once: bool,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    mod cli_tests {
        use super::*;

        #[test]
        fn test_parse_no_args() {
            let cli = Cli::parse_from(["timekeeper"]);
            assert!(cli.command.is_none());
            assert!(!cli.verbose);
            assert!(cli.data_dir.is_none());
        }

        #[test]
        fn test_parse_global_flags() {
            let cli = Cli::parse_from(["timekeeper", "status", "-v", "--data-dir", "/tmp/tk"]);
            assert!(cli.verbose);
            assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/tk")));
            assert!(matches!(cli.command, Some(Commands::Status)));
        }

        #[test]
        fn test_verify_cli() {
            use clap::CommandFactory;
            Cli::command().debug_assert();
        }
    }

    mod timer_tests {
        use super::*;

        fn parse_timer(args: &[&str]) -> TimerAction {
            let mut argv = vec!["timekeeper", "timer"];
            argv.extend_from_slice(args);
            match Cli::parse_from(argv).command {
                Some(Commands::Timer { action }) => action,
                other => panic!("Expected timer command, got {:?}", other),
            }
        }

        #[test]
        fn test_start_default_five_minutes() {
            assert_eq!(parse_timer(&["start"]), TimerAction::Start { seconds: 300 });
        }

        #[test]
        fn test_start_with_seconds() {
            assert_eq!(parse_timer(&["start", "90"]), TimerAction::Start { seconds: 90 });
        }

        #[test]
        fn test_start_zero_rejected() {
            assert!(Cli::try_parse_from(["timekeeper", "timer", "start", "0"]).is_err());
        }

        #[test]
        fn test_pause_and_reset() {
            assert_eq!(parse_timer(&["pause"]), TimerAction::Pause);
            assert_eq!(parse_timer(&["reset"]), TimerAction::Reset);
        }
    }

    mod pomodoro_tests {
        use super::*;

        #[test]
        fn test_parse_settings() {
            let cli = Cli::parse_from([
                "timekeeper",
                "pomodoro",
                "settings",
                "--work",
                "50",
                "--long-break",
                "30",
            ]);
            match cli.command {
                Some(Commands::Pomodoro {
                    action: PomodoroAction::Settings(args),
                }) => {
                    assert_eq!(args.work, Some(50));
                    assert_eq!(args.short_break, None);
                    assert_eq!(args.long_break, Some(30));
                }
                other => panic!("Expected settings command, got {:?}", other),
            }
        }

        #[test]
        fn test_settings_out_of_range_rejected() {
            assert!(
                Cli::try_parse_from(["timekeeper", "pomodoro", "settings", "--work", "0"]).is_err()
            );
            assert!(Cli::try_parse_from([
                "timekeeper",
                "pomodoro",
                "settings",
                "--short-break",
                "181"
            ])
            .is_err());
        }

        #[test]
        fn test_settings_merge() {
            let args = SettingsArgs {
                short_break: Some(10),
                ..Default::default()
            };
            assert!(!args.is_empty());

            let merged = args.merge(PomodoroSettings::default());
            assert_eq!(merged.work_duration, 25);
            assert_eq!(merged.short_break_duration, 10);
            assert_eq!(merged.long_break_duration, 15);
            assert!(SettingsArgs::default().is_empty());
        }
    }

    mod display_mode_tests {
        use super::*;

        #[test]
        fn test_parse_watch() {
            let cli = Cli::parse_from(["timekeeper", "watch", "stopwatch", "--once"]);
            match cli.command {
                Some(Commands::Watch(args)) => {
                    assert_eq!(args.mode, Some(Mode::Stopwatch));
                    assert!(args.once);
                }
                other => panic!("Expected watch command, got {:?}", other),
            }
        }

        #[test]
        fn test_parse_watch_without_mode() {
            let cli = Cli::parse_from(["timekeeper", "watch"]);
            assert!(matches!(
                cli.command,
                Some(Commands::Watch(WatchArgs { mode: None, once: false }))
            ));
        }

        #[test]
        fn test_parse_pin() {
            let cli = Cli::parse_from(["timekeeper", "pin", "pomodoro"]);
            assert!(matches!(
                cli.command,
                Some(Commands::Pin {
                    mode: Mode::Pomodoro
                })
            ));
            assert!(Cli::try_parse_from(["timekeeper", "pin", "clock"]).is_err());
        }

        #[test]
        fn test_parse_daemon_no_notify() {
            let cli = Cli::parse_from(["timekeeper", "daemon", "--no-notify"]);
            assert!(matches!(
                cli.command,
                Some(Commands::Daemon { no_notify: true })
            ));
        }
    }
}
