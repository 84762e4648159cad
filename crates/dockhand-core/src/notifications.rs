//! In-process notification center
//!
//! Library-side equivalent of the dashboard's toast notifications: the
//! reconciler and the error paths post entries here and the binary renders
//! them. An entry counts as visible for a TTL after posting; duplicate
//! suppression asks whether a visible entry still mentions a given stack.

use chrono::{DateTime, Utc};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Success => write!(f, "success"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// One posted notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub id: Uuid,
    pub severity: Severity,
    pub title: String,
    pub message: String,
    pub posted_at: DateTime<Utc>,
}

struct Entry {
    notification: Notification,
    expires_at: Instant,
}

/// Collects notifications and fans them out to live subscribers.
pub struct NotificationCenter {
    entries: Mutex<Vec<Entry>>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<Notification>>>,
    ttl: Duration,
}

impl NotificationCenter {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            subscribers: Mutex::new(Vec::new()),
            ttl,
        }
    }

    pub fn post(
        &self,
        severity: Severity,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Notification {
        let notification = Notification {
            id: Uuid::new_v4(),
            severity,
            title: title.into(),
            message: message.into(),
            posted_at: Utc::now(),
        };
        tracing::debug!(
            "Notification [{}] {}: {}",
            notification.severity,
            notification.title,
            notification.message
        );

        let now = Instant::now();
        {
            let mut entries = self.entries.lock().unwrap();
            prune(&mut entries, now);
            entries.push(Entry {
                notification: notification.clone(),
                expires_at: now + self.ttl,
            });
        }

        self.subscribers
            .lock()
            .unwrap()
            .retain(|tx| tx.send(notification.clone()).is_ok());

        notification
    }

    pub fn info(&self, title: impl Into<String>, message: impl Into<String>) -> Notification {
        self.post(Severity::Info, title, message)
    }

    pub fn success(&self, title: impl Into<String>, message: impl Into<String>) -> Notification {
        self.post(Severity::Success, title, message)
    }

    pub fn error(&self, title: impl Into<String>, message: impl Into<String>) -> Notification {
        self.post(Severity::Error, title, message)
    }

    /// Notifications still within their visibility window, oldest first.
    pub fn active(&self) -> Vec<Notification> {
        let mut entries = self.entries.lock().unwrap();
        prune(&mut entries, Instant::now());
        entries
            .iter()
            .map(|entry| entry.notification.clone())
            .collect()
    }

    /// Whether a still-visible notification mentions `text` in its title or
    /// message. Drives per-stack duplicate suppression.
    pub fn mentions(&self, text: &str) -> bool {
        let mut entries = self.entries.lock().unwrap();
        prune(&mut entries, Instant::now());
        entries.iter().any(|entry| {
            entry.notification.title.contains(text) || entry.notification.message.contains(text)
        })
    }

    /// Live feed of notifications as they are posted.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<Notification> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().unwrap().push(tx);
        rx
    }
}

fn prune(entries: &mut Vec<Entry>, now: Instant) {
    entries.retain(|entry| entry.expires_at > now);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn center() -> NotificationCenter {
        NotificationCenter::new(Duration::from_secs(60))
    }

    #[test]
    fn test_post_and_active() {
        let notifier = center();
        notifier.success("Service updated", "web updated successfully");
        notifier.error("Update failed", "media: connection refused");

        let active = notifier.active();
        assert_eq!(active.len(), 2);
        assert_eq!(active[0].severity, Severity::Success);
        assert_eq!(active[1].severity, Severity::Error);
        assert_ne!(active[0].id, active[1].id);
    }

    #[test]
    fn test_mentions_scans_title_and_message() {
        let notifier = center();
        notifier.success("Service updated", "Stack 'web' is up to date");

        assert!(notifier.mentions("web"));
        assert!(notifier.mentions("Service updated"));
        assert!(!notifier.mentions("media"));
    }

    #[test]
    fn test_expired_entries_stop_counting() {
        let notifier = NotificationCenter::new(Duration::from_millis(10));
        notifier.success("Service updated", "Stack 'web' is up to date");
        assert!(notifier.mentions("web"));

        std::thread::sleep(Duration::from_millis(25));
        assert!(!notifier.mentions("web"));
        assert!(notifier.active().is_empty());
    }

    #[tokio::test]
    async fn test_subscribers_get_live_feed() {
        let notifier = center();
        let mut feed = notifier.subscribe();

        let posted = notifier.success("Service updated", "web/app");
        let received = feed.recv().await.unwrap();
        assert_eq!(received.id, posted.id);
        assert_eq!(received.message, "web/app");
    }

    #[test]
    fn test_dropped_subscriber_is_cleaned_up() {
        let notifier = center();
        let feed = notifier.subscribe();
        drop(feed);

        // Posting after the receiver is gone must not fail
        notifier.info("Auto-update", "cycle complete");
        assert_eq!(notifier.active().len(), 1);
    }
}
