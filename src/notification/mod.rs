//! Desktop notification integration.
//!
//! Notifications are fire-and-forget: the engine hands content to a
//! [`Notifier`] and moves on. Delivery failures are logged, never returned.
//!
//! # Example
//!
//! ```rust,no_run
//! use timekeeper::notification::{create_timer_complete_content, DesktopNotifier, Notifier};
//!
//! let notifier = DesktopNotifier::new();
//! notifier.notify(&create_timer_complete_content());
//! ```

mod content;
pub mod error;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use notify_rust::Notification;

pub use self::content::{
    create_session_change_content, create_timer_complete_content, NotificationContent,
};
pub use self::error::NotificationError;

/// Application name shown by the notification server.
const APP_NAME: &str = "timekeeper";

/// Trait for notification delivery.
pub trait Notifier: Send + Sync {
    /// Shows `content` without waiting for delivery.
    fn notify(&self, content: &NotificationContent);

    /// Returns true if notifications will be shown.
    fn is_enabled(&self) -> bool;
}

// ============================================================================
// DesktopNotifier
// ============================================================================

/// Notifier backed by the platform notification server.
#[derive(Debug)]
pub struct DesktopNotifier {
    enabled: AtomicBool,
}

impl DesktopNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self {
            enabled: AtomicBool::new(true),
        }
    }

    /// Creates a notifier that only logs.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: AtomicBool::new(false),
        }
    }

    /// Shows a notification synchronously.
    ///
    /// # Errors
    ///
    /// Returns `Disabled` if the notifier was switched off and `SendFailed`
    /// if the notification server is unreachable.
    pub fn show(&self, content: &NotificationContent) -> Result<(), NotificationError> {
        self.ensure_enabled()?;
        Self::send(content)
    }

    fn ensure_enabled(&self) -> Result<(), NotificationError> {
        if self.is_enabled() {
            Ok(())
        } else {
            Err(NotificationError::Disabled)
        }
    }

    fn send(content: &NotificationContent) -> Result<(), NotificationError> {
        Notification::new()
            .summary(&content.title)
            .body(&content.message)
            .appname(APP_NAME)
            .show()
            .map(|_| ())
            .map_err(|e| NotificationError::SendFailed(e.to_string()))
    }
}

impl Default for DesktopNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier for DesktopNotifier {
    fn notify(&self, content: &NotificationContent) {
        tracing::info!("通知: {} - {}", content.title, content.message);

        if let Err(e) = self.ensure_enabled() {
            tracing::debug!("{} ({})", e, e.suggestion());
            return;
        }

        let content = content.clone();
        let deliver = move || {
            if let Err(e) = Self::send(&content) {
                tracing::warn!("{} ({})", e, e.suggestion());
            }
        };

        // Notification servers may block on D-Bus or the system bridge.
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(deliver);
            }
            Err(_) => {
                std::thread::spawn(deliver);
            }
        }
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }
}

// ============================================================================
// MockNotifier
// ============================================================================

/// Mock notifier for testing.
#[derive(Debug, Default)]
pub struct MockNotifier {
    notifications: Mutex<Vec<NotificationContent>>,
}

impl MockNotifier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get_notifications(&self) -> Vec<NotificationContent> {
        self.notifications.lock().unwrap().clone()
    }

    #[must_use]
    pub fn notification_count(&self) -> usize {
        self.notifications.lock().unwrap().len()
    }

    pub fn clear_recorded(&self) {
        self.notifications.lock().unwrap().clear();
    }
}

impl Notifier for MockNotifier {
    fn notify(&self, content: &NotificationContent) {
        self.notifications.lock().unwrap().push(content.clone());
    }

    fn is_enabled(&self) -> bool {
        true
    }
}
