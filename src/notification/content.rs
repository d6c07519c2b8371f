//! Notification content construction.

use crate::daemon::pomodoro::SessionType;

/// Title/message pair shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationContent {
    pub title: String,
    pub message: String,
}

/// Content for a finished countdown timer.
pub fn create_timer_complete_content() -> NotificationContent {
    NotificationContent {
        title: "Timer Complete".to_string(),
        message: "Your timer has finished!".to_string(),
    }
}

/// Content announcing the Pomodoro session that just started.
pub fn create_session_change_content(session_type: SessionType) -> NotificationContent {
    NotificationContent {
        title: "Pomodoro Session".to_string(),
        message: format!("Starting {}", session_type),
    }
}
