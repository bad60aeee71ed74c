//! Builds notifier channels from profile notification settings.

use std::collections::HashMap;

use tracing::{debug, warn};

use killwatch_rules::{ChannelKind, NotificationChannelConfig, ProfileRegistry};

use crate::dispatcher::Dispatcher;
use crate::logging::LogNotifier;
use crate::traits::{Notifier, NotifyError};
use crate::webhook::WebhookNotifier;

/// Build one notifier from its config.
pub fn build_channel(config: &NotificationChannelConfig) -> Result<Box<dyn Notifier>, NotifyError> {
    match config.channel {
        ChannelKind::Log => Ok(Box::new(LogNotifier)),
        ChannelKind::Webhook => Ok(Box::new(WebhookNotifier::from_channel(config)?)),
    }
}

/// Build a dispatcher for every profile in `registry`.
///
/// Channels that fail to build are logged and left out. Profiles without
/// usable channels fall back to the defaults: the default webhook when one
/// is configured, otherwise the log channel.
pub fn build_dispatcher(registry: &ProfileRegistry, default_webhook_url: Option<&str>) -> Dispatcher {
    let mut profile_channels = HashMap::new();

    for profile in registry.profiles() {
        let mut channels: Vec<Box<dyn Notifier>> = Vec::new();
        for config in &profile.profile.notifications {
            match build_channel(config) {
                Ok(channel) => channels.push(channel),
                Err(e) => warn!(
                    profile_id = profile.id(),
                    channel = ?config.channel,
                    error = %e,
                    "skipping notification channel"
                ),
            }
        }
        if !channels.is_empty() {
            profile_channels.insert(profile.id(), channels);
        }
    }

    let default_channels = default_channels(default_webhook_url);
    debug!(
        profiles_with_channels = profile_channels.len(),
        default_channels = default_channels.len(),
        "notification dispatcher built"
    );
    Dispatcher::new(profile_channels, default_channels)
}

fn default_channels(default_webhook_url: Option<&str>) -> Vec<Box<dyn Notifier>> {
    if let Some(url) = default_webhook_url {
        match WebhookNotifier::post_to(url) {
            Ok(webhook) => return vec![Box::new(webhook)],
            Err(e) => warn!(error = %e, "default webhook unusable, falling back to log channel"),
        }
    }
    vec![Box::new(LogNotifier)]
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use killwatch_rules::Profile;

    use super::*;

    fn channel(kind: ChannelKind, url: Option<&str>) -> NotificationChannelConfig {
        NotificationChannelConfig {
            channel: kind,
            url: url.map(str::to_string),
            method: None,
            headers: HashMap::new(),
        }
    }

    #[test]
    fn webhook_without_url_is_rejected() {
        assert!(build_channel(&channel(ChannelKind::Webhook, None)).is_err());
        let ok = build_channel(&channel(ChannelKind::Webhook, Some("https://example.invalid/h"))).unwrap();
        assert_eq!(ok.channel_name(), "webhook");
    }

    #[test]
    fn profiles_get_own_channels_or_defaults() {
        let mut with_channels = Profile::new(1, "a", json!({}));
        with_channels.notifications = vec![
            channel(ChannelKind::Log, None),
            channel(ChannelKind::Webhook, Some("https://example.invalid/h")),
        ];
        let mut broken = Profile::new(2, "b", json!({}));
        broken.notifications = vec![channel(ChannelKind::Webhook, Some("${KW_SURELY_UNSET_VAR}"))];
        let plain = Profile::new(3, "c", json!({}));

        let registry = ProfileRegistry::build(vec![with_channels, broken, plain], 1);
        let dispatcher = build_dispatcher(&registry, None);

        assert_eq!(dispatcher.channel_count(1), 2);
        // Unusable channel falls back to the default log channel.
        assert_eq!(dispatcher.channel_count(2), 1);
        assert_eq!(dispatcher.channel_count(3), 1);
    }
}
