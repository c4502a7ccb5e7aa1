//! Shopper-facing notifications.
//!
//! Fire-and-forget broadcast: sending with no listeners is not an error and
//! slow listeners simply miss old messages.

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

/// Default number of notifications buffered per listener.
pub const DEFAULT_CAPACITY: usize = 32;

/// Severity of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Success,
    Info,
    Warning,
    Error,
}

/// A message for the shopper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
}

impl Notification {
    /// Create a notification.
    #[must_use]
    pub fn new(level: NotificationLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }
}

/// Broadcasts notifications to every subscriber.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: broadcast::Sender<Notification>,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl Notifier {
    /// Create a notifier buffering `capacity` messages per listener.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Listen for notifications sent from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }

    /// Send a notification to whoever is listening.
    pub fn notify(&self, level: NotificationLevel, message: impl Into<String>) {
        let notification = Notification::new(level, message);
        debug!(level = ?notification.level, message = %notification.message, "Notification");
        let _ = self.tx.send(notification);
    }

    pub fn success(&self, message: impl Into<String>) {
        self.notify(NotificationLevel::Success, message);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.notify(NotificationLevel::Info, message);
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.notify(NotificationLevel::Warning, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.notify(NotificationLevel::Error, message);
    }
}
