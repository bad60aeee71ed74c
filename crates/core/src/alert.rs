//! Match results and the persisted alert record with its lifecycle.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::killmail::KillmailId;

pub type ProfileId = i64;
pub type AlertId = Uuid;
/// Depth-first ordinal of a leaf inside a compiled criteria tree.
pub type LeafId = u32;

/// Outcome of one profile matching one killmail.
///
/// Only created when the profile's root node evaluated true.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub profile_id: ProfileId,
    pub profile_name: String,
    pub killmail_id: KillmailId,
    pub matched_at: DateTime<Utc>,
    /// Weighted share of satisfied leaves, in `[0, 1]`.
    pub confidence_score: f64,
    pub matched_leaves: Vec<LeafId>,
}

/// Ordering priority shared by alerts and recommendations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    /// Alert priority derived from a match's confidence.
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence >= 0.9 {
            Priority::High
        } else if confidence >= 0.6 {
            Priority::Medium
        } else {
            Priority::Low
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::Low => write!(f, "low"),
            Priority::Medium => write!(f, "medium"),
            Priority::High => write!(f, "high"),
            Priority::Critical => write!(f, "critical"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertState {
    New,
    Acknowledged,
    Resolved,
}

impl AlertState {
    /// Legal moves: `new → acknowledged`, `new → resolved`, `acknowledged → resolved`.
    pub fn can_transition_to(self, next: AlertState) -> bool {
        matches!(
            (self, next),
            (AlertState::New, AlertState::Acknowledged)
                | (AlertState::New, AlertState::Resolved)
                | (AlertState::Acknowledged, AlertState::Resolved)
        )
    }

    pub fn is_terminal(self) -> bool {
        self == AlertState::Resolved
    }
}

impl fmt::Display for AlertState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertState::New => write!(f, "new"),
            AlertState::Acknowledged => write!(f, "acknowledged"),
            AlertState::Resolved => write!(f, "resolved"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("illegal alert transition {from} -> {to}")]
pub struct TransitionError {
    pub from: AlertState,
    pub to: AlertState,
}

/// Persisted record derived from a [`MatchResult`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: AlertId,
    pub profile_id: ProfileId,
    pub profile_name: String,
    pub killmail_id: KillmailId,
    pub confidence_score: f64,
    pub matched_leaves: Vec<LeafId>,
    pub priority: Priority,
    pub state: AlertState,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acknowledged_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acknowledged_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Alert {
    /// Build a fresh `new` alert from a match result.
    pub fn from_match(result: &MatchResult, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            profile_id: result.profile_id,
            profile_name: result.profile_name.clone(),
            killmail_id: result.killmail_id,
            confidence_score: result.confidence_score,
            matched_leaves: result.matched_leaves.clone(),
            priority: Priority::from_confidence(result.confidence_score),
            state: AlertState::New,
            created_at,
            acknowledged_by: None,
            acknowledged_at: None,
            resolved_by: None,
            resolved_at: None,
        }
    }

    /// Move the alert to `next`, recording who did it and when.
    pub fn transition(
        &mut self,
        next: AlertState,
        actor: &str,
        at: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        if !self.state.can_transition_to(next) {
            return Err(TransitionError {
                from: self.state,
                to: next,
            });
        }
        match next {
            AlertState::Acknowledged => {
                self.acknowledged_by = Some(actor.to_string());
                self.acknowledged_at = Some(at);
            }
            AlertState::Resolved => {
                self.resolved_by = Some(actor.to_string());
                self.resolved_at = Some(at);
            }
            AlertState::New => {}
        }
        self.state = next;
        Ok(())
    }
}
