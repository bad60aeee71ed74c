//! Notifier that writes alerts to the tracing log.

use crate::traits::{Notification, Notifier, NotifyError};

/// Emits each notification as a structured `info` event. Never fails.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait::async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        tracing::info!(
            target: "killwatch::alerts",
            subject = %notification.subject,
            profile_id = notification.metadata.get("profile_id").map(String::as_str).unwrap_or(""),
            killmail_id = notification.metadata.get("killmail_id").map(String::as_str).unwrap_or(""),
            priority = notification.metadata.get("priority").map(String::as_str).unwrap_or(""),
            "{}",
            notification.body
        );
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "log"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn log_channel_always_succeeds() {
        let notifier = LogNotifier;
        assert!(notifier.test().await.is_ok());
        assert_eq!(notifier.channel_name(), "log");
    }
}
