//! Minijinja template rendering for notification messages.
//!
//! Renders notification subject and body templates using minijinja,
//! with access to the profile, the killmail and the alert.
//!
//! Templates are arbitrary strings (not pre-registered), so a fresh
//! [`minijinja::Environment`] is created per render call.

use std::collections::HashMap;

use serde::Serialize;

use killwatch_core::{AlertId, KillmailFact, MatchResult, Priority};

use crate::traits::{Notification, NotifyError};

pub const DEFAULT_SUBJECT: &str =
    "[killwatch] {{ profile.name }} matched killmail {{ killmail.id }}";

pub const DEFAULT_BODY: &str = "\
Profile \"{{ profile.name }}\" matched with {{ (alert.confidence * 100) | round }}% confidence ({{ alert.priority }}).
Value: {{ killmail.total_value | isk }}
{% if killmail.solar_system_id %}System: {{ killmail.solar_system_id }}
{% endif %}Attackers: {{ killmail.attacker_count }}
{{ killmail.url }}";

/// Context data available to notification templates.
#[derive(Debug, Clone, Serialize)]
pub struct TemplateContext {
    pub profile: ProfileContext,
    pub killmail: KillmailContext,
    pub alert: AlertContext,
    /// Event type: `"match"` or `"test"`.
    pub event: String,
    /// Current timestamp in ISO 8601 format.
    pub now: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfileContext {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct KillmailContext {
    pub id: i64,
    pub time: String,
    /// ISK value, 0 when unknown.
    pub total_value: f64,
    pub solar_system_id: Option<i64>,
    pub victim_character_id: Option<i64>,
    pub victim_corporation_id: Option<i64>,
    pub victim_alliance_id: Option<i64>,
    pub victim_ship_type_id: Option<i64>,
    pub attacker_count: u32,
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AlertContext {
    pub id: Option<String>,
    pub confidence: f64,
    pub priority: String,
    pub matched_leaves: Vec<u32>,
}

impl TemplateContext {
    /// Build the context for a match. `profile` fills in details the
    /// match result doesn't carry.
    pub fn for_match(
        result: &MatchResult,
        fact: &KillmailFact,
        alert_id: Option<AlertId>,
        profile: Option<ProfileContext>,
    ) -> Self {
        let profile = profile.unwrap_or_else(|| ProfileContext {
            id: result.profile_id,
            name: result.profile_name.clone(),
            description: None,
            tags: Vec::new(),
        });

        Self {
            profile,
            killmail: KillmailContext::from(fact),
            alert: AlertContext {
                id: alert_id.map(|id| id.to_string()),
                confidence: result.confidence_score,
                priority: Priority::from_confidence(result.confidence_score).to_string(),
                matched_leaves: result.matched_leaves.clone(),
            },
            event: "match".to_string(),
            now: chrono::Utc::now().to_rfc3339(),
        }
    }
}

impl From<&KillmailFact> for KillmailContext {
    fn from(fact: &KillmailFact) -> Self {
        Self {
            id: fact.killmail_id,
            time: fact.timestamp.to_rfc3339(),
            total_value: fact.total_value.unwrap_or(0.0),
            solar_system_id: fact.solar_system_id,
            victim_character_id: fact.victim_character_id,
            victim_corporation_id: fact.victim_corporation_id,
            victim_alliance_id: fact.victim_alliance_id,
            victim_ship_type_id: fact.victim_ship_type_id,
            attacker_count: fact.attacker_count.unwrap_or(0),
            url: fact.zkb_url(),
        }
    }
}

/// Subject and body templates for alert notifications.
#[derive(Debug, Clone)]
pub struct MessageTemplates {
    pub subject: String,
    pub body: String,
}

impl MessageTemplates {
    /// Templates from configuration, falling back to the built-in ones for
    /// anything unset. Both are parsed up front so a typo fails at startup
    /// instead of on the first alert.
    pub fn from_config(subject: Option<&str>, body: Option<&str>) -> Result<Self, NotifyError> {
        let templates = Self {
            subject: subject.unwrap_or(DEFAULT_SUBJECT).to_string(),
            body: body.unwrap_or(DEFAULT_BODY).to_string(),
        };
        let renderer = TemplateRenderer::new();
        renderer
            .validate(&templates.subject)
            .map_err(|e| NotifyError::Template(format!("subject: {e}")))?;
        renderer
            .validate(&templates.body)
            .map_err(|e| NotifyError::Template(format!("body: {e}")))?;
        Ok(templates)
    }
}

impl Default for MessageTemplates {
    fn default() -> Self {
        Self {
            subject: DEFAULT_SUBJECT.to_string(),
            body: DEFAULT_BODY.to_string(),
        }
    }
}

/// Renders notification templates using minijinja.
#[derive(Debug)]
pub struct TemplateRenderer {
    _private: (),
}

impl TemplateRenderer {
    pub fn new() -> Self {
        Self { _private: () }
    }

    /// Minijinja environment with the killwatch filters on top of the builtins.
    fn build_env() -> minijinja::Environment<'static> {
        let mut env = minijinja::Environment::new();
        env.add_filter("round", round_filter);
        env.add_filter("isk", isk_filter);
        env
    }

    /// Render a template string with the given context.
    pub fn render(&self, template_str: &str, ctx: &TemplateContext) -> Result<String, NotifyError> {
        let env = Self::build_env();
        env.render_str(template_str, ctx)
            .map_err(|e| NotifyError::Template(e.to_string()))
    }

    /// Check that a template string parses.
    pub fn validate(&self, template_str: &str) -> Result<(), NotifyError> {
        let env = Self::build_env();
        env.template_from_str(template_str)
            .map_err(|e| NotifyError::Template(e.to_string()))?;
        Ok(())
    }

    /// Render both templates into a [`Notification`] with routing metadata.
    pub fn notification(
        &self,
        templates: &MessageTemplates,
        ctx: &TemplateContext,
    ) -> Result<Notification, NotifyError> {
        let mut metadata = HashMap::from([
            ("profile_id".to_string(), ctx.profile.id.to_string()),
            ("killmail_id".to_string(), ctx.killmail.id.to_string()),
            ("priority".to_string(), ctx.alert.priority.clone()),
            ("event".to_string(), ctx.event.clone()),
        ]);
        if let Some(id) = &ctx.alert.id {
            metadata.insert("alert_id".to_string(), id.clone());
        }

        Ok(Notification {
            subject: self.render(&templates.subject, ctx)?,
            body: self.render(&templates.body, ctx)?,
            metadata,
            context: Some(ctx.clone()),
        })
    }
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::new()
    }
}

/// Custom filter: round a float to N decimal places.
fn round_filter(value: f64, decimals: Option<u32>) -> String {
    let n = decimals.unwrap_or(0);
    format!("{:.prec$}", value, prec = n as usize)
}

/// Custom filter: compact ISK amount, e.g. `1.25B ISK`.
fn isk_filter(value: f64) -> String {
    let abs = value.abs();
    if abs >= 1e12 {
        format!("{:.2}T ISK", value / 1e12)
    } else if abs >= 1e9 {
        format!("{:.2}B ISK", value / 1e9)
    } else if abs >= 1e6 {
        format!("{:.2}M ISK", value / 1e6)
    } else if abs >= 1e3 {
        format!("{:.2}K ISK", value / 1e3)
    } else {
        format!("{:.0} ISK", value)
    }
}
