//! Webhook channel: posts each alert as a JSON document.
//!
//! The body carries the rendered text plus the structured profile, killmail
//! and alert sections, so receivers can route on fields instead of parsing
//! the message:
//!
//! ```json
//! {
//!   "event": "match",
//!   "subject": "[killwatch] Jita whales matched killmail 118000001",
//!   "text": "...",
//!   "profile": {"id": 42, "name": "Jita whales", ...},
//!   "killmail": {"id": 118000001, "total_value": 2450000000.0, "url": "...", ...},
//!   "alert": {"id": "...", "confidence": 0.98, "priority": "high", ...}
//! }
//! ```
//!
//! Channel tests send the same shape with `"event": "test"` and no sections.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Method;
use serde::Serialize;

use killwatch_rules::NotificationChannelConfig;

use crate::templating::{AlertContext, KillmailContext, ProfileContext};
use crate::traits::{Notification, Notifier, NotifyError};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
/// Longest slice of a rejection body kept in the error.
const MAX_ERROR_BODY: usize = 512;

/// JSON body of one webhook request.
#[derive(Debug, Serialize)]
pub struct WebhookPayload<'a> {
    pub event: &'a str,
    pub subject: &'a str,
    pub text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<&'a ProfileContext>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub killmail: Option<&'a KillmailContext>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert: Option<&'a AlertContext>,
}

impl<'a> From<&'a Notification> for WebhookPayload<'a> {
    fn from(notification: &'a Notification) -> Self {
        let ctx = notification.context.as_ref();
        Self {
            event: ctx.map(|c| c.event.as_str()).unwrap_or("test"),
            subject: &notification.subject,
            text: &notification.body,
            profile: ctx.map(|c| &c.profile),
            killmail: ctx.map(|c| &c.killmail),
            alert: ctx.map(|c| &c.alert),
        }
    }
}

#[derive(Debug)]
pub struct WebhookNotifier {
    url: String,
    method: Method,
    headers: HeaderMap,
    client: reqwest::Client,
}

impl WebhookNotifier {
    /// Webhook for one of a profile's notification channels.
    ///
    /// `${VAR}` references in the URL and header values are expanded from the
    /// environment here, once; a missing variable is a config error.
    pub fn from_channel(config: &NotificationChannelConfig) -> Result<Self, NotifyError> {
        let url = config
            .url
            .as_deref()
            .ok_or_else(|| NotifyError::Config("webhook channel requires `url`".to_string()))?;
        Self::build(url, config.method.as_deref(), &config.headers)
    }

    /// Plain POST webhook, used as the fallback channel.
    pub fn post_to(url: &str) -> Result<Self, NotifyError> {
        Self::build(url, None, &HashMap::new())
    }

    fn build(
        url: &str,
        method: Option<&str>,
        headers: &HashMap<String, String>,
    ) -> Result<Self, NotifyError> {
        let url = expand_env(url)?;
        if url.trim().is_empty() {
            return Err(NotifyError::Config("webhook url is empty".to_string()));
        }

        let method = match method {
            Some(m) => Method::from_bytes(m.trim().to_ascii_uppercase().as_bytes())
                .map_err(|_| NotifyError::Config(format!("invalid HTTP method: {m}")))?,
            None => Method::POST,
        };

        let mut header_map = HeaderMap::with_capacity(headers.len());
        for (name, value) in headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| NotifyError::Config(format!("invalid header name: {name}")))?;
            let value = HeaderValue::from_str(&expand_env(value)?)
                .map_err(|_| NotifyError::Config(format!("invalid value for header {name}")))?;
            header_map.insert(name, value);
        }

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("killwatch/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            url,
            method,
            headers: header_map,
            client,
        })
    }
}

#[async_trait::async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let payload = WebhookPayload::from(notification);
        let response = self
            .client
            .request(self.method.clone(), &self.url)
            .headers(self.headers.clone())
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let mut text = response.text().await.unwrap_or_default();
            if text.len() > MAX_ERROR_BODY {
                let cut = (0..=MAX_ERROR_BODY)
                    .rev()
                    .find(|i| text.is_char_boundary(*i))
                    .unwrap_or(0);
                text.truncate(cut);
            }
            tracing::warn!(
                url = %self.url,
                %status,
                event = payload.event,
                killmail_id = payload.killmail.map(|k| k.id),
                "webhook rejected alert"
            );
            return Err(NotifyError::Rejected(format!("{status}: {text}")));
        }

        tracing::debug!(
            url = %self.url,
            %status,
            event = payload.event,
            alert_id = payload.alert.and_then(|a| a.id.as_deref()),
            "webhook delivered"
        );
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "webhook"
    }
}

/// Expand `${NAME}` references from the process environment.
fn expand_env(input: &str) -> Result<String, NotifyError> {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after
            .find('}')
            .ok_or_else(|| NotifyError::Config(format!("unterminated ${{...}} in {input:?}")))?;
        let name = &after[..end];
        let value = std::env::var(name)
            .map_err(|_| NotifyError::Config(format!("environment variable {name} is not set")))?;
        out.push_str(&value);
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}
