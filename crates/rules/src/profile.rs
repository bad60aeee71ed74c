//! Surveillance profiles: user-owned criteria plus delivery settings.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use killwatch_core::ProfileId;

use crate::criteria::CompiledCriteria;

fn default_true() -> bool {
    true
}

/// A profile as stored by its owner. Criteria stay in wire form until the
/// registry compiles them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: ProfileId,
    /// Character that owns the profile.
    #[serde(default)]
    pub owner: Option<i64>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub criteria: serde_json::Value,
    /// Delivery channels. Empty means the dispatcher's defaults.
    #[serde(default)]
    pub notifications: Vec<NotificationChannelConfig>,
}

impl Profile {
    pub fn new(id: ProfileId, name: impl Into<String>, criteria: serde_json::Value) -> Self {
        Self {
            id,
            owner: None,
            name: name.into(),
            description: None,
            tags: Vec::new(),
            enabled: true,
            criteria,
            notifications: Vec::new(),
        }
    }
}

/// Notification channel kinds a profile can route to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Webhook,
    Log,
}

/// Per-profile notification channel settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationChannelConfig {
    pub channel: ChannelKind,
    /// Webhook URL. Supports `${ENV_VAR}` references.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

/// A profile with its criteria compiled, as held by the registry.
#[derive(Debug, Clone)]
pub struct CompiledProfile {
    pub profile: Profile,
    pub criteria: CompiledCriteria,
}

impl CompiledProfile {
    /// Compile a profile's criteria, logging any degraded nodes.
    pub fn compile(profile: Profile) -> Self {
        let criteria = CompiledCriteria::compile(&profile.criteria);
        criteria.log_issues(profile.id);
        Self { profile, criteria }
    }

    pub fn id(&self) -> ProfileId {
        self.profile.id
    }

    pub fn name(&self) -> &str {
        &self.profile.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_profile_yaml() {
        let yaml = r#"
id: 42
owner: 90000001
name: Jita whales
criteria:
  condition: and
  rules:
    - field: total_value
      operator: gt
      value: 100000000
notifications:
  - channel: webhook
    url: https://example.invalid/hook
  - channel: log
"#;
        let profile: Profile = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(profile.id, 42);
        assert_eq!(profile.owner, Some(90000001));
        assert!(profile.enabled);
        assert_eq!(profile.notifications.len(), 2);
        assert_eq!(profile.notifications[0].channel, ChannelKind::Webhook);
        assert_eq!(profile.notifications[1].url, None);

        let compiled = CompiledProfile::compile(profile);
        assert_eq!(compiled.criteria.leaf_count, 1);
        assert_eq!(compiled.name(), "Jita whales");
    }

    #[test]
    fn missing_criteria_compiles_to_unmatchable() {
        let profile: Profile = serde_json::from_str(r#"{"id": 1, "name": "empty"}"#).unwrap();
        let compiled = CompiledProfile::compile(profile);
        assert!(!compiled.criteria.is_matchable());
    }
}
