//! Notifier trait definition and shared error types.

use std::collections::HashMap;

use serde::Serialize;

use killwatch_core::ProfileId;

use crate::templating::TemplateContext;

/// Errors that can occur during notification delivery.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Delivery rejected: {0}")]
    Rejected(String),

    #[error("Template rendering failed: {0}")]
    Template(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// A rendered notification ready for delivery.
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    /// The rendered subject/title.
    pub subject: String,
    /// The rendered body content.
    pub body: String,
    /// Flat routing fields (profile id, killmail id, priority, event).
    pub metadata: HashMap<String, String>,
    /// The match this notification is about. `None` for channel tests.
    pub context: Option<TemplateContext>,
}

/// Trait for notification channel implementations.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver a notification through this channel.
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError>;

    /// Test connectivity with a sample notification.
    async fn test(&self) -> Result<(), NotifyError> {
        let test_notification = Notification {
            subject: "[TEST] killwatch notification test".to_string(),
            body: "This is a test notification from killwatch surveillance.".to_string(),
            metadata: HashMap::from([("event".to_string(), "test".to_string())]),
            context: None,
        };
        self.send(&test_notification).await
    }

    /// Human-readable name for this channel (e.g., "webhook", "log").
    fn channel_name(&self) -> &str;
}

/// Result of dispatching a notification to a single channel.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchResult {
    pub channel: String,
    pub profile_id: ProfileId,
    pub success: bool,
    pub error: Option<String>,
    pub duration_ms: u64,
}
