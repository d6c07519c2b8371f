//! Notification system error types.

use thiserror::Error;

/// Errors that can occur while showing a desktop notification.
#[derive(Debug, Error)]
pub enum NotificationError {
    /// The notification server rejected or could not display the notification.
    #[error("通知の送信に失敗しました: {0}")]
    SendFailed(String),

    /// Notifications were switched off.
    #[error("通知は無効化されています")]
    Disabled,
}

impl NotificationError {
    /// Returns a user-friendly suggestion for resolving this error.
    #[must_use]
    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::SendFailed(_) => "デスクトップの通知設定を確認してください",
            Self::Disabled => "--no-notify を外してDaemonを再起動してください",
        }
    }
}
