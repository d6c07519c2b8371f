//! Engine error types.
//!
//! Only invalid input ever surfaces to a caller. Storage trouble is logged
//! and degrades to default state instead (see `store`).

use thiserror::Error;

/// Errors returned by engine commands.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    /// Countdown duration was zero.
    #[error("タイマーの時間は1秒以上を指定してください")]
    InvalidDuration,

    /// A Pomodoro duration was outside the accepted range.
    #[error("{field}は{min}-{max}分の範囲で指定してください")]
    InvalidSettings {
        field: &'static str,
        min: u32,
        max: u32,
    },
}
