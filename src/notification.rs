//! Transient notifications for success and error messages.

use std::time::Duration;

use tokio::sync::broadcast;

/// How long error notifications stay visible.
pub const ERROR_DURATION: Duration = Duration::from_secs(10);

/// How long other notifications stay visible.
pub const DEFAULT_DURATION: Duration = Duration::from_secs(3);

const CHANNEL_CAPACITY: usize = 32;

/// Notification types for styling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    /// Neutral information.
    Info,
    /// An action completed.
    Success,
    /// An action failed.
    Error,
}

/// A message for the user that disappears after `duration`.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    /// How the notification should be styled.
    pub level: Level,
    /// The text shown to the user.
    pub message: String,
    /// How long the notification stays visible.
    pub duration: Duration,
}

/// Broadcasts notifications to whoever is displaying them.
///
/// Sending with no subscribers is fine, the notification is dropped.
#[derive(Debug, Clone)]
pub struct Notifier {
    sender: broadcast::Sender<Notification>,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier {
    /// Create a notifier with no subscribers.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);

        Self { sender }
    }

    /// Receive notifications sent from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }

    /// Show an error message.
    pub fn error(&self, message: impl Into<String>) {
        self.notify(Level::Error, message.into(), ERROR_DURATION);
    }

    /// Show a success message.
    pub fn success(&self, message: impl Into<String>) {
        self.notify(Level::Success, message.into(), DEFAULT_DURATION);
    }

    /// Show an informational message.
    pub fn info(&self, message: impl Into<String>) {
        self.notify(Level::Info, message.into(), DEFAULT_DURATION);
    }

    fn notify(&self, level: Level, message: String, duration: Duration) {
        // An error only means nobody is listening.
        let _ = self.sender.send(Notification {
            level,
            message,
            duration,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::{DEFAULT_DURATION, ERROR_DURATION, Level, Notifier};

    #[tokio::test]
    async fn subscribers_receive_notifications() {
        let notifier = Notifier::new();
        let mut receiver = notifier.subscribe();

        notifier.error("Could not save");
        notifier.success("Saved");

        let first = receiver.recv().await.unwrap();
        assert_eq!(first.level, Level::Error);
        assert_eq!(first.message, "Could not save");
        assert_eq!(first.duration, ERROR_DURATION);

        let second = receiver.recv().await.unwrap();
        assert_eq!(second.level, Level::Success);
        assert_eq!(second.duration, DEFAULT_DURATION);
    }

    #[test]
    fn notifying_without_subscribers_does_not_panic() {
        Notifier::new().info("nobody is listening");
    }
}
