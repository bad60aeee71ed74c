//! Bulk lifecycle operations.

use serde::Serialize;
use tracing::{info, warn};

use killwatch_core::{AlertId, AlertState};

use crate::error::Result;
use crate::store::{AlertHistory, AlertQuery};

/// Outcome of a bulk transition. `succeeded + failed == selected`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BulkOutcome {
    pub selected: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub errors: Vec<BulkFailure>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkFailure {
    pub alert_id: AlertId,
    pub error: String,
}

/// Acknowledge every `new` alert matching `filter`.
///
/// The filter's own `state` is ignored. Each alert is transitioned on its
/// own; one failure does not stop the rest.
pub fn bulk_acknowledge(
    history: &dyn AlertHistory,
    filter: &AlertQuery,
    actor: &str,
) -> Result<BulkOutcome> {
    bulk_transition(history, filter, AlertState::New, AlertState::Acknowledged, actor)
}

/// Resolve every `acknowledged` alert matching `filter`.
pub fn bulk_resolve(
    history: &dyn AlertHistory,
    filter: &AlertQuery,
    actor: &str,
) -> Result<BulkOutcome> {
    bulk_transition(history, filter, AlertState::Acknowledged, AlertState::Resolved, actor)
}

fn bulk_transition(
    history: &dyn AlertHistory,
    filter: &AlertQuery,
    from: AlertState,
    to: AlertState,
    actor: &str,
) -> Result<BulkOutcome> {
    let query = AlertQuery {
        state: Some(from),
        ..filter.clone()
    };
    let selected = history.query_alerts(&query)?;

    let mut outcome = BulkOutcome {
        selected: selected.len(),
        ..BulkOutcome::default()
    };
    for alert in selected {
        match history.transition(alert.id, to, actor) {
            Ok(_) => outcome.succeeded += 1,
            Err(e) => {
                warn!(alert_id = %alert.id, error = %e, "bulk transition failed for alert");
                outcome.failed += 1;
                outcome.errors.push(BulkFailure {
                    alert_id: alert.id,
                    error: e.to_string(),
                });
            }
        }
    }

    info!(
        actor,
        to = %to,
        selected = outcome.selected,
        succeeded = outcome.succeeded,
        failed = outcome.failed,
        "bulk alert transition"
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use chrono::Utc;

    use killwatch_core::{Alert, AlertRecorder, MatchResult};

    use super::*;
    use crate::error::AlertError;
    use crate::store::InMemoryAlertStore;

    fn record(store: &InMemoryAlertStore, profile_id: i64) -> AlertId {
        store
            .record_match(&MatchResult {
                profile_id,
                profile_name: "p".into(),
                killmail_id: 1,
                matched_at: Utc::now(),
                confidence_score: 1.0,
                matched_leaves: vec![0],
            })
            .unwrap()
    }

    #[test]
    fn acknowledges_only_new_alerts() {
        let store = InMemoryAlertStore::new();
        let fresh: Vec<_> = (0..4).map(|_| record(&store, 1)).collect();
        let acked = record(&store, 1);
        store.acknowledge(acked, "earlier").unwrap();
        let resolved = record(&store, 1);
        store.resolve(resolved, "earlier").unwrap();

        let outcome = bulk_acknowledge(&store, &AlertQuery::default(), "ops").unwrap();
        assert_eq!(outcome.selected, 4);
        assert_eq!(outcome.succeeded, 4);
        assert_eq!(outcome.failed, 0);

        for id in fresh {
            let a = store.get_alert(id).unwrap();
            assert_eq!(a.state, AlertState::Acknowledged);
            assert_eq!(a.acknowledged_by.as_deref(), Some("ops"));
        }
        assert_eq!(
            store.get_alert(acked).unwrap().acknowledged_by.as_deref(),
            Some("earlier")
        );
        assert_eq!(store.get_alert(resolved).unwrap().state, AlertState::Resolved);
    }

    #[test]
    fn respects_profile_filter() {
        let store = InMemoryAlertStore::new();
        record(&store, 1);
        record(&store, 2);
        let outcome = bulk_acknowledge(&store, &AlertQuery::for_profile(2), "ops").unwrap();
        assert_eq!(outcome.succeeded, 1);

        let still_new = store
            .query_alerts(&AlertQuery::default().in_state(AlertState::New))
            .unwrap();
        assert_eq!(still_new.len(), 1);
        assert_eq!(still_new[0].profile_id, 1);
    }

    /// History whose transitions fail for a fixed set of alerts.
    struct PartiallyBroken {
        inner: InMemoryAlertStore,
        broken: HashSet<AlertId>,
    }

    impl AlertHistory for PartiallyBroken {
        fn query_alerts(&self, query: &AlertQuery) -> Result<Vec<Alert>> {
            self.inner.query_alerts(query)
        }
        fn get_alert(&self, id: AlertId) -> Result<Alert> {
            self.inner.get_alert(id)
        }
        fn transition(&self, id: AlertId, next: AlertState, actor: &str) -> Result<Alert> {
            if self.broken.contains(&id) {
                return Err(AlertError::Storage("write conflict".into()));
            }
            self.inner.transition(id, next, actor)
        }
    }

    #[test]
    fn success_count_excludes_failures() {
        let inner = InMemoryAlertStore::new();
        let ids: Vec<_> = (0..5).map(|_| record(&inner, 1)).collect();
        let history = PartiallyBroken {
            broken: ids[..2].iter().copied().collect(),
            inner,
        };

        let outcome = bulk_acknowledge(&history, &AlertQuery::default(), "ops").unwrap();
        assert_eq!(outcome.selected, 5);
        assert_eq!(outcome.succeeded, 3);
        assert_eq!(outcome.failed, 2);
        assert_eq!(outcome.errors.len(), 2);
    }

    #[test]
    fn bulk_resolve_moves_acknowledged() {
        let store = InMemoryAlertStore::new();
        let a = record(&store, 1);
        let b = record(&store, 1);
        store.acknowledge(a, "ops").unwrap();

        let outcome = bulk_resolve(&store, &AlertQuery::default(), "ops").unwrap();
        assert_eq!(outcome.succeeded, 1);
        assert_eq!(store.get_alert(a).unwrap().state, AlertState::Resolved);
        assert_eq!(store.get_alert(b).unwrap().state, AlertState::New);
    }
}
