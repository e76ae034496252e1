//! Notification channel
//!
//! Reports, warnings and fatal errors leave the crawler through a
//! [`Notifier`]. Delivery itself is out of reach of this crate:
//! [`ConsoleNotifier`] writes each message to standard output, where the
//! scheduler that runs the binary picks it up.

use crate::SpiderError;
use std::sync::Mutex;
use tracing::{debug, error};

/// Destination for reports and alerts
pub trait Notifier: Send + Sync {
    /// Sends a message; `None` picks the default recipient or subject
    fn notify(&self, text: &str, recipient: Option<&str>, subject: Option<&str>);

    /// Subject used for warnings and fatal errors
    fn error_subject(&self) -> String {
        "sitemap error".to_string()
    }

    /// Optionally notifies, then returns the error that ends the run
    fn stop(&self, message: &str, should_notify: bool) -> SpiderError {
        error!("{}", message);
        if should_notify {
            self.notify(message, None, Some(&self.error_subject()));
        }
        SpiderError::Fatal(message.to_string())
    }
}

/// Prints notifications to standard output
#[derive(Debug, Clone)]
pub struct ConsoleNotifier {
    host: String,
    default_recipient: String,
    enabled: bool,
}

impl ConsoleNotifier {
    /// # Arguments
    ///
    /// * `host` - Host of the crawled site, used in subjects
    /// * `default_recipient` - Recipient when none is given
    /// * `enabled` - `false` drops every message (test mode)
    pub fn new(host: &str, default_recipient: &str, enabled: bool) -> Self {
        Self {
            host: host.to_string(),
            default_recipient: default_recipient.to_string(),
            enabled,
        }
    }
}

impl Notifier for ConsoleNotifier {
    fn notify(&self, text: &str, recipient: Option<&str>, subject: Option<&str>) {
        if !self.enabled {
            debug!("Notification suppressed: {}", subject.unwrap_or("(no subject)"));
            return;
        }

        let to = recipient
            .filter(|r| !r.is_empty())
            .unwrap_or(&self.default_recipient);
        if to.is_empty() {
            debug!("Notification without recipient dropped");
            return;
        }

        let subject = subject
            .map(str::to_string)
            .unwrap_or_else(|| format!("{} sitemap", self.host));

        println!("\nto: {}\nsubj: {}\ntext: {}\n", to, subject, text);
    }

    fn error_subject(&self) -> String {
        format!("{} sitemap error", self.host)
    }
}

/// A delivered message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub text: String,
    pub recipient: Option<String>,
    pub subject: Option<String>,
}

/// Keeps every notification in memory
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// All notifications sent so far
    pub fn sent(&self) -> Vec<Notification> {
        self.sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }

    /// Notifications whose subject contains `needle`
    pub fn with_subject(&self, needle: &str) -> Vec<Notification> {
        self.sent()
            .into_iter()
            .filter(|n| n.subject.as_deref().is_some_and(|s| s.contains(needle)))
            .collect()
    }
}

impl Notifier for MemoryNotifier {
    fn notify(&self, text: &str, recipient: Option<&str>, subject: Option<&str>) {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(Notification {
                text: text.to_string(),
                recipient: recipient.map(str::to_string),
                subject: subject.map(str::to_string),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_notifies_and_returns_fatal() {
        let notifier = MemoryNotifier::new();
        let err = notifier.stop("broken", true);

        assert!(matches!(err, SpiderError::Fatal(ref m) if m == "broken"));
        let sent = notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject.as_deref(), Some("sitemap error"));
    }

    #[test]
    fn test_stop_without_notification() {
        let notifier = MemoryNotifier::new();
        let _ = notifier.stop("quiet", false);
        assert!(notifier.sent().is_empty());
    }

    #[test]
    fn test_with_subject() {
        let notifier = MemoryNotifier::new();
        notifier.notify("a", None, Some("ex.com sitemap"));
        notifier.notify("b", None, Some("ex.com - radar"));
        notifier.notify("c", None, None);

        assert_eq!(notifier.with_subject("radar").len(), 1);
        assert_eq!(notifier.with_subject("ex.com").len(), 2);
    }

    #[test]
    fn test_console_error_subject() {
        let notifier = ConsoleNotifier::new("ex.com", "", false);
        assert_eq!(notifier.error_subject(), "ex.com sitemap error");
    }
}
