//! Alert history: recording, querying and transitioning alerts.
//!
//! [`InMemoryAlertStore`] keeps alerts in insertion order, capped at a
//! configurable maximum with FIFO eviction. Uses `std::sync::RwLock` so it can
//! be shared between the async alert pipeline and synchronous metrics reads.

use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Deserialize;
use tracing::{debug, info};

use killwatch_core::{
    Alert, AlertId, AlertRecorder, AlertState, MatchResult, Priority, ProfileId,
};

use crate::error::{AlertError, Result};

/// Filters for alert queries. Every set field must match.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AlertQuery {
    pub profile_id: Option<ProfileId>,
    pub state: Option<AlertState>,
    /// Minimum priority (inclusive).
    pub min_priority: Option<Priority>,
    /// Only alerts created at or after this time.
    pub since: Option<DateTime<Utc>>,
    /// Only alerts created before this time.
    pub until: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

impl AlertQuery {
    pub fn for_profile(profile_id: ProfileId) -> Self {
        Self {
            profile_id: Some(profile_id),
            ..Self::default()
        }
    }

    pub fn in_state(mut self, state: AlertState) -> Self {
        self.state = Some(state);
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether `alert` passes every filter (ignores `limit`).
    pub fn matches(&self, alert: &Alert) -> bool {
        self.profile_id.map_or(true, |id| alert.profile_id == id)
            && self.state.map_or(true, |s| alert.state == s)
            && self.min_priority.map_or(true, |p| alert.priority >= p)
            && self.since.map_or(true, |t| alert.created_at >= t)
            && self.until.map_or(true, |t| alert.created_at < t)
    }
}

/// Read and lifecycle access to stored alerts.
pub trait AlertHistory: Send + Sync {
    /// Alerts matching `query`, newest first.
    fn query_alerts(&self, query: &AlertQuery) -> Result<Vec<Alert>>;

    fn get_alert(&self, id: AlertId) -> Result<Alert>;

    /// Apply a lifecycle transition and return the updated alert.
    fn transition(&self, id: AlertId, next: AlertState, actor: &str) -> Result<Alert>;

    fn acknowledge(&self, id: AlertId, actor: &str) -> Result<Alert> {
        self.transition(id, AlertState::Acknowledged, actor)
    }

    fn resolve(&self, id: AlertId, actor: &str) -> Result<Alert> {
        self.transition(id, AlertState::Resolved, actor)
    }
}

/// In-memory alert store with optional FIFO cap.
#[derive(Default)]
pub struct InMemoryAlertStore {
    alerts: RwLock<IndexMap<AlertId, Alert>>,
    max_alerts: Option<usize>,
}

impl InMemoryAlertStore {
    /// Create an unbounded store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that evicts the oldest alerts beyond `max`.
    pub fn with_max_alerts(max: usize) -> Self {
        Self {
            alerts: RwLock::new(IndexMap::new()),
            max_alerts: Some(max.max(1)),
        }
    }

    /// Insert a fully built alert (e.g. restored from elsewhere).
    pub fn insert(&self, alert: Alert) -> AlertId {
        let id = alert.id;
        let mut guard = self.alerts.write().unwrap_or_else(PoisonError::into_inner);
        guard.insert(id, alert);
        if let Some(max) = self.max_alerts {
            while guard.len() > max {
                if let Some((evicted, _)) = guard.shift_remove_index(0) {
                    debug!(alert_id = %evicted, "evicted oldest alert");
                }
            }
        }
        id
    }

    /// Transition with an explicit timestamp.
    pub fn transition_at(
        &self,
        id: AlertId,
        next: AlertState,
        actor: &str,
        at: DateTime<Utc>,
    ) -> Result<Alert> {
        let mut guard = self.alerts.write().unwrap_or_else(PoisonError::into_inner);
        let alert = guard.get_mut(&id).ok_or(AlertError::NotFound(id))?;
        alert.transition(next, actor, at)?;
        info!(alert_id = %id, state = %next, actor, "alert transitioned");
        Ok(alert.clone())
    }

    pub fn len(&self) -> usize {
        self.alerts.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every stored alert, oldest first.
    pub fn all(&self) -> Vec<Alert> {
        self.alerts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }
}

impl AlertHistory for InMemoryAlertStore {
    fn query_alerts(&self, query: &AlertQuery) -> Result<Vec<Alert>> {
        let guard = self.alerts.read().unwrap_or_else(PoisonError::into_inner);
        let mut out: Vec<Alert> = guard.values().filter(|a| query.matches(a)).cloned().collect();
        // Insertion order is creation order for recorded alerts, but inserted
        // alerts may carry any timestamp.
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if let Some(limit) = query.limit {
            out.truncate(limit);
        }
        Ok(out)
    }

    fn get_alert(&self, id: AlertId) -> Result<Alert> {
        self.alerts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
            .ok_or(AlertError::NotFound(id))
    }

    fn transition(&self, id: AlertId, next: AlertState, actor: &str) -> Result<Alert> {
        self.transition_at(id, next, actor, Utc::now())
    }
}

impl AlertRecorder for InMemoryAlertStore {
    fn record_match(&self, result: &MatchResult) -> killwatch_core::Result<AlertId> {
        let alert = Alert::from_match(result, Utc::now());
        debug!(
            alert_id = %alert.id,
            profile_id = alert.profile_id,
            killmail_id = alert.killmail_id,
            priority = %alert.priority,
            "alert recorded"
        );
        Ok(self.insert(alert))
    }
}
