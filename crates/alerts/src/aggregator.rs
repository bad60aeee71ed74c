//! System-wide alert metrics over a time window.

use std::collections::HashSet;

use serde::Serialize;
use tracing::debug;

use killwatch_core::config::MetricsConfig;
use killwatch_core::{Alert, AlertState, Priority};

use crate::error::Result;
use crate::metrics::{ProfileMetrics, ProfileSummary, TimeWindow};
use crate::recommendations::{recommend, Recommendation};
use crate::store::{AlertHistory, AlertQuery};

#[derive(Debug, Clone, Default, Serialize)]
pub struct StateCounts {
    pub new: u64,
    pub acknowledged: u64,
    pub resolved: u64,
}

impl StateCounts {
    fn add(&mut self, state: AlertState) {
        match state {
            AlertState::New => self.new += 1,
            AlertState::Acknowledged => self.acknowledged += 1,
            AlertState::Resolved => self.resolved += 1,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PriorityCounts {
    pub low: u64,
    pub medium: u64,
    pub high: u64,
    pub critical: u64,
}

impl PriorityCounts {
    fn add(&mut self, priority: Priority) {
        match priority {
            Priority::Low => self.low += 1,
            Priority::Medium => self.medium += 1,
            Priority::High => self.high += 1,
            Priority::Critical => self.critical += 1,
        }
    }
}

/// Dashboard summary of one window.
#[derive(Debug, Clone, Serialize)]
pub struct AlertMetrics {
    pub window: TimeWindow,
    pub total_alerts: u64,
    pub by_state: StateCounts,
    pub by_priority: PriorityCounts,
    pub avg_confidence: f64,
    pub profiles_triggered: usize,
    pub alerts_per_hour: f64,
    pub avg_response_ms: f64,
    pub profiles: Vec<ProfileMetrics>,
    pub recommendations: Vec<Recommendation>,
}

/// Read-only aggregation over alert history.
#[derive(Debug, Clone, Default)]
pub struct MetricsAggregator {
    config: MetricsConfig,
}

impl MetricsAggregator {
    pub fn new(config: MetricsConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MetricsConfig {
        &self.config
    }

    /// Default window from config, ending now.
    pub fn default_window(&self) -> TimeWindow {
        TimeWindow::last_hours(self.config.window_hours)
    }

    /// Metrics for every profile given, in input order.
    pub fn profile_metrics(
        &self,
        profiles: &[ProfileSummary],
        history: &dyn AlertHistory,
        window: &TimeWindow,
    ) -> Result<Vec<ProfileMetrics>> {
        let alerts = window_alerts(history, window)?;
        Ok(self.compute_profiles(profiles, &alerts, window))
    }

    pub fn recommendations(
        &self,
        metrics: &[ProfileMetrics],
        avg_response_ms: f64,
    ) -> Vec<Recommendation> {
        recommend(metrics, avg_response_ms, &self.config)
    }

    /// Full system summary. Empty history yields zeroed figures.
    pub fn alert_metrics(
        &self,
        profiles: &[ProfileSummary],
        history: &dyn AlertHistory,
        window: &TimeWindow,
        avg_response_ms: f64,
    ) -> Result<AlertMetrics> {
        let alerts = window_alerts(history, window)?;

        let mut by_state = StateCounts::default();
        let mut by_priority = PriorityCounts::default();
        let mut triggered = HashSet::new();
        let mut confidence_sum = 0.0;
        for alert in &alerts {
            by_state.add(alert.state);
            by_priority.add(alert.priority);
            triggered.insert(alert.profile_id);
            confidence_sum += alert.confidence_score;
        }

        let total = alerts.len() as u64;
        let avg_confidence = if total == 0 {
            0.0
        } else {
            confidence_sum / total as f64
        };
        let profiles = self.compute_profiles(profiles, &alerts, window);
        let recommendations = self.recommendations(&profiles, avg_response_ms);

        debug!(
            total_alerts = total,
            profiles = profiles.len(),
            recommendations = recommendations.len(),
            "alert metrics computed"
        );

        Ok(AlertMetrics {
            window: *window,
            total_alerts: total,
            by_state,
            by_priority,
            avg_confidence,
            profiles_triggered: triggered.len(),
            alerts_per_hour: total as f64 / window.hours(),
            avg_response_ms,
            profiles,
            recommendations,
        })
    }

    fn compute_profiles(
        &self,
        profiles: &[ProfileSummary],
        alerts: &[Alert],
        window: &TimeWindow,
    ) -> Vec<ProfileMetrics> {
        profiles
            .iter()
            .map(|p| {
                ProfileMetrics::compute(p, alerts, window, self.config.estimated_killmails_per_hour)
            })
            .collect()
    }
}

fn window_alerts(history: &dyn AlertHistory, window: &TimeWindow) -> Result<Vec<Alert>> {
    let query = AlertQuery {
        since: Some(window.start),
        until: Some(window.end),
        ..AlertQuery::default()
    };
    history.query_alerts(&query)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use killwatch_core::MatchResult;

    use super::*;
    use crate::recommendations::RecommendationKind;
    use crate::store::InMemoryAlertStore;

    fn summary(id: i64, enabled: bool, leaf_count: usize) -> ProfileSummary {
        ProfileSummary {
            id,
            name: format!("p{}", id),
            enabled,
            leaf_count,
        }
    }

    fn insert(store: &InMemoryAlertStore, profile_id: i64, confidence: f64, hours_ago: i64) {
        let at = Utc::now() - Duration::hours(hours_ago);
        store.insert(Alert::from_match(
            &MatchResult {
                profile_id,
                profile_name: "p".into(),
                killmail_id: 1,
                matched_at: at,
                confidence_score: confidence,
                matched_leaves: vec![0],
            },
            at,
        ));
    }

    #[test]
    fn empty_history_gives_zeroed_metrics() {
        let aggregator = MetricsAggregator::default();
        let store = InMemoryAlertStore::new();
        let window = aggregator.default_window();
        let m = aggregator
            .alert_metrics(&[summary(1, true, 4)], &store, &window, 0.0)
            .unwrap();

        assert_eq!(m.total_alerts, 0);
        assert_eq!(m.avg_confidence, 0.0);
        assert_eq!(m.profiles_triggered, 0);
        assert_eq!(m.alerts_per_hour, 0.0);
        assert_eq!(m.profiles.len(), 1);
        assert_eq!(m.profiles[0].alerts_generated, 0);
    }

    #[test]
    fn summarizes_window() {
        let aggregator = MetricsAggregator::default();
        let store = InMemoryAlertStore::new();
        insert(&store, 1, 1.0, 1);
        insert(&store, 1, 0.5, 2);
        insert(&store, 2, 0.95, 3);
        insert(&store, 2, 0.95, 72);

        let first = store.all()[0].id;
        store.acknowledge(first, "ops").unwrap();

        let window = aggregator.default_window();
        let m = aggregator
            .alert_metrics(
                &[summary(1, true, 2), summary(2, true, 2), summary(3, false, 2)],
                &store,
                &window,
                15.0,
            )
            .unwrap();

        assert_eq!(m.total_alerts, 3);
        assert_eq!(m.by_state.new, 2);
        assert_eq!(m.by_state.acknowledged, 1);
        assert_eq!(m.by_priority.high, 2);
        assert_eq!(m.by_priority.low, 1);
        assert_eq!(m.profiles_triggered, 2);
        assert!((m.alerts_per_hour - 3.0 / 24.0).abs() < 1e-6);
        assert_eq!(m.profiles[0].alerts_generated, 2);
        assert_eq!(m.profiles[1].alerts_generated, 1);
        assert!(m
            .recommendations
            .iter()
            .any(|r| r.kind == RecommendationKind::InactiveProfiles && r.profile_ids == vec![3]));
    }

    #[test]
    fn slow_engine_gets_critical_recommendation() {
        let aggregator = MetricsAggregator::default();
        let recs = aggregator.recommendations(&[], 350.0);
        assert_eq!(recs.len(), 1);
        assert_eq!(recs[0].priority, Priority::Critical);
    }
}
