//! Display utilities for the timekeeper CLI.
//!
//! This module provides formatted output for:
//! - Command results
//! - The full status view
//! - The compact single-line view used by `watch`
//! - Pushed events
//! - Error messages

use crate::daemon::pomodoro::{PomodoroSettings, PomodoroState};
use crate::daemon::stopwatch::StopwatchState;
use crate::daemon::timer::{TimerState, TimerStatus};
use crate::types::{DaemonEvent, IpcResponse, Mode, Snapshot};

// ============================================================================
// Time formatting
// ============================================================================

/// Formats seconds as `HH:MM:SS`.
pub fn format_hms(total_seconds: u64) -> String {
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}

/// Formats milliseconds as `HH:MM:SS.mmm`.
pub fn format_hms_millis(total_ms: u64) -> String {
    format!("{}.{:03}", format_hms(total_ms / 1000), total_ms % 1000)
}

/// Formats seconds as `MM:SS`. Minutes are not wrapped into hours.
pub fn format_ms(total_seconds: u64) -> String {
    format!("{:02}:{:02}", total_seconds / 60, total_seconds % 60)
}

// ============================================================================
// Display
// ============================================================================

/// Display utilities for CLI output.
pub struct Display;

impl Display {
    /// Shows the result of a timer command.
    pub fn show_timer(response: &IpcResponse, now_ms: i64) {
        println!("* {}", response.message);
        if let Some(data) = &response.data {
            println!("  {}", Self::timer_line(&data.timer_state, now_ms));
        }
    }

    /// Shows the result of a stopwatch command.
    pub fn show_stopwatch(response: &IpcResponse, now_ms: i64) {
        println!("* {}", response.message);
        if let Some(data) = &response.data {
            println!("  {}", Self::stopwatch_line(&data.stopwatch_state, now_ms));
        }
    }

    /// Shows the result of a Pomodoro command.
    pub fn show_pomodoro(response: &IpcResponse, now_ms: i64) {
        println!("* {}", response.message);
        if let Some(data) = &response.data {
            println!(
                "  {}",
                Self::pomodoro_line(&data.pomodoro_state, &data.pomodoro_settings, now_ms)
            );
        }
    }

    /// Shows the current Pomodoro durations.
    pub fn show_settings(response: &IpcResponse) {
        if !response.message.is_empty() {
            println!("* {}", response.message);
        }
        if let Some(data) = &response.data {
            println!("  {}", Self::settings_line(&data.pomodoro_settings));
        }
    }

    /// Shows the result of `pin`.
    pub fn show_pinned(response: &IpcResponse) {
        println!("* {}", response.message);
        if let Some(data) = &response.data {
            println!("  表示モード: {}", data.pinned_timer_type);
        }
    }

    /// Shows every mode.
    pub fn show_status(response: &IpcResponse, now_ms: i64) {
        println!("timekeeper ステータス");
        println!("─────────────────────────────");

        match &response.data {
            Some(data) => {
                for line in Self::status_lines(data, now_ms) {
                    println!("{}", line);
                }
            }
            None => println!("状態を取得できませんでした"),
        }
    }

    /// Shows a pushed event.
    pub fn show_event(event: &DaemonEvent) {
        println!("{}", Self::event_line(event));
    }

    /// Shows an error message.
    pub fn show_error(message: &str) {
        eprintln!("エラー: {}", message);
    }

    // ------------------------------------------------------------------------
    // Line builders
    // ------------------------------------------------------------------------

    /// Lines of the status view.
    pub fn status_lines(data: &Snapshot, now_ms: i64) -> Vec<String> {
        vec![
            Self::timer_line(&data.timer_state, now_ms),
            Self::stopwatch_line(&data.stopwatch_state, now_ms),
            Self::pomodoro_line(&data.pomodoro_state, &data.pomodoro_settings, now_ms),
            Self::settings_line(&data.pomodoro_settings),
            format!("表示モード: {}", data.pinned_timer_type),
        ]
    }

    /// Single-line view of `mode`, as shown by `watch`.
    ///
    /// The stopwatch is shown without milliseconds here.
    pub fn compact_line(data: &Snapshot, mode: Mode, now_ms: i64) -> String {
        match mode {
            Mode::Timer => format_hms(data.timer_state.current_remaining(now_ms)),
            Mode::Stopwatch => {
                format_hms(data.stopwatch_state.current_elapsed(now_ms) / 1000)
            }
            Mode::Pomodoro => format!(
                "{} {}",
                format_ms(data.pomodoro_state.current_remaining(now_ms)),
                data.pomodoro_state.session_type
            ),
        }
    }

    fn timer_line(timer: &TimerState, now_ms: i64) -> String {
        let label = match timer.status() {
            TimerStatus::Running => "実行中",
            TimerStatus::Paused => "一時停止中",
            TimerStatus::Idle => "停止中",
        };
        format!(
            "タイマー: {} ({})",
            format_hms(timer.current_remaining(now_ms)),
            label
        )
    }

    fn stopwatch_line(stopwatch: &StopwatchState, now_ms: i64) -> String {
        let label = if stopwatch.is_running {
            "実行中"
        } else if stopwatch.elapsed_ms > 0 {
            "一時停止中"
        } else {
            "停止中"
        };
        format!(
            "ストップウォッチ: {} ({})",
            format_hms_millis(stopwatch.current_elapsed(now_ms)),
            label
        )
    }

    fn pomodoro_line(
        pomodoro: &PomodoroState,
        settings: &PomodoroSettings,
        now_ms: i64,
    ) -> String {
        let label = if pomodoro.is_running {
            "実行中"
        } else if pomodoro.remaining_seconds < settings.duration_secs(pomodoro.session_type) {
            "一時停止中"
        } else {
            "停止中"
        };
        format!(
            "ポモドーロ: {} {} #{} ({})",
            format_ms(pomodoro.current_remaining(now_ms)),
            pomodoro.session_type,
            pomodoro.cycle,
            label
        )
    }

    fn settings_line(settings: &PomodoroSettings) -> String {
        format!(
            "設定: 作業{}分 / 短い休憩{}分 / 長い休憩{}分",
            settings.work_duration, settings.short_break_duration, settings.long_break_duration
        )
    }

    fn event_line(event: &DaemonEvent) -> String {
        match event {
            DaemonEvent::TimerComplete => "タイマーが終了しました".to_string(),
            DaemonEvent::PomodoroSessionChange {
                session_type,
                cycle,
            } => format!("{} を開始しました (サイクル{})", session_type, cycle),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::daemon::pomodoro::SessionType;

    const T: i64 = 1_700_000_000_000;

    mod format_tests {
        use super::*;

        #[test]
        fn test_format_hms() {
            assert_eq!(format_hms(0), "00:00:00");
            assert_eq!(format_hms(300), "00:05:00");
            assert_eq!(format_hms(3_661), "01:01:01");
            assert_eq!(format_hms(100 * 3600), "100:00:00");
        }

        #[test]
        fn test_format_hms_millis() {
            assert_eq!(format_hms_millis(0), "00:00:00.000");
            assert_eq!(format_hms_millis(1_234), "00:00:01.234");
            assert_eq!(format_hms_millis(3_600_007), "01:00:00.007");
        }

        #[test]
        fn test_format_ms() {
            assert_eq!(format_ms(1_500), "25:00");
            assert_eq!(format_ms(59), "00:59");
            assert_eq!(format_ms(180 * 60), "180:00");
        }
    }

    mod line_tests {
        use super::*;

        #[test]
        fn test_compact_line_uses_current_time() {
            let mut data = Snapshot::default();
            data.timer_state.start(300, T).unwrap();
            data.stopwatch_state.start(T - 61_500);
            data.pomodoro_state = PomodoroState {
                session_type: SessionType::ShortBreak,
                remaining_seconds: 300,
                is_running: true,
                end_time: Some(T + 90_000),
                cycle: 2,
            };

            let now = T + 10_000;
            assert_eq!(Display::compact_line(&data, Mode::Timer, now), "00:04:50");
            assert_eq!(Display::compact_line(&data, Mode::Stopwatch, now), "00:01:11");
            assert_eq!(
                Display::compact_line(&data, Mode::Pomodoro, now),
                "01:20 Short Break"
            );
        }

        #[test]
        fn test_status_lines_idle() {
            let lines = Display::status_lines(&Snapshot::default(), T);
            assert_eq!(lines[0], "タイマー: 00:00:00 (停止中)");
            assert_eq!(lines[1], "ストップウォッチ: 00:00:00.000 (停止中)");
            assert_eq!(lines[2], "ポモドーロ: 25:00 Work Session #1 (停止中)");
            assert_eq!(lines[3], "設定: 作業25分 / 短い休憩5分 / 長い休憩15分");
            assert_eq!(lines[4], "表示モード: timer");
        }

        #[test]
        fn test_status_lines_paused() {
            let mut data = Snapshot::default();
            data.timer_state.remaining_seconds = 42;
            data.stopwatch_state.elapsed_ms = 1_000;
            data.pomodoro_state.remaining_seconds = 1_000;

            let lines = Display::status_lines(&data, T);
            assert!(lines[0].ends_with("(一時停止中)"));
            assert!(lines[1].ends_with("(一時停止中)"));
            assert!(lines[2].ends_with("(一時停止中)"));
        }

        #[test]
        fn test_event_line() {
            assert_eq!(
                Display::event_line(&DaemonEvent::TimerComplete),
                "タイマーが終了しました"
            );
            assert_eq!(
                Display::event_line(&DaemonEvent::PomodoroSessionChange {
                    session_type: SessionType::LongBreak,
                    cycle: 1
                }),
                "Long Break を開始しました (サイクル1)"
            );
        }
    }

    mod display_tests {
        use super::*;

        #[test]
        fn test_show_functions_do_not_panic() {
            let response = IpcResponse::success("OK", Some(Snapshot::default()));
            Display::show_timer(&response, T);
            Display::show_stopwatch(&response, T);
            Display::show_pomodoro(&response, T);
            Display::show_settings(&response);
            Display::show_pinned(&response);
            Display::show_status(&response, T);
            Display::show_status(&IpcResponse::success("", None), T);
            Display::show_event(&DaemonEvent::TimerComplete);
            Display::show_error("Test error message");
        }
    }
}
