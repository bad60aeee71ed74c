//! Optimization recommendations derived from profile metrics.

use serde::Serialize;

use killwatch_core::config::MetricsConfig;
use killwatch_core::{Priority, ProfileId};

use crate::metrics::ProfileMetrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    InactiveProfiles,
    LowPerformance,
    HighFalsePositives,
    PerformanceDegradation,
}

#[derive(Debug, Clone, Serialize)]
pub struct Recommendation {
    #[serde(rename = "type")]
    pub kind: RecommendationKind,
    pub priority: Priority,
    pub title: String,
    pub description: String,
    pub action: String,
    /// Profiles the recommendation is about. Empty for system-wide findings.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub profile_ids: Vec<ProfileId>,
}

/// Run every rule check independently and return the findings, most
/// urgent first.
pub fn recommend(
    metrics: &[ProfileMetrics],
    avg_response_ms: f64,
    config: &MetricsConfig,
) -> Vec<Recommendation> {
    let mut out = Vec::new();

    let inactive = ids_where(metrics, |m| !m.enabled);
    if !inactive.is_empty() {
        out.push(Recommendation {
            kind: RecommendationKind::InactiveProfiles,
            priority: Priority::Medium,
            title: "Inactive profiles".to_string(),
            description: format!("{} profile(s) are disabled and not being evaluated", inactive.len()),
            action: "Review disabled profiles and re-enable or delete them".to_string(),
            profile_ids: inactive,
        });
    }

    let low = ids_where(metrics, |m| m.performance_score < config.low_performance_threshold);
    if !low.is_empty() {
        out.push(Recommendation {
            kind: RecommendationKind::LowPerformance,
            priority: Priority::High,
            title: "Low performing profiles".to_string(),
            description: format!(
                "{} profile(s) score below {:.0}",
                low.len(),
                config.low_performance_threshold
            ),
            action: "Broaden or refine the criteria of these profiles".to_string(),
            profile_ids: low,
        });
    }

    let noisy = ids_where(metrics, |m| {
        m.false_positive_rate > config.high_false_positive_threshold
    });
    if !noisy.is_empty() {
        out.push(Recommendation {
            kind: RecommendationKind::HighFalsePositives,
            priority: Priority::High,
            title: "High false positive risk".to_string(),
            description: format!(
                "{} profile(s) have criteria too loose to be selective",
                noisy.len()
            ),
            action: "Add more specific conditions to these profiles".to_string(),
            profile_ids: noisy,
        });
    }

    if avg_response_ms > config.response_time_threshold_ms {
        out.push(Recommendation {
            kind: RecommendationKind::PerformanceDegradation,
            priority: Priority::Critical,
            title: "Performance degradation".to_string(),
            description: format!(
                "Average killmail evaluation takes {:.1}ms (threshold {:.0}ms)",
                avg_response_ms, config.response_time_threshold_ms
            ),
            action: "Reduce the number of active profiles or simplify their criteria".to_string(),
            profile_ids: Vec::new(),
        });
    }

    // Stable sort keeps rule order within a priority.
    out.sort_by(|a, b| b.priority.cmp(&a.priority));
    out
}

fn ids_where(metrics: &[ProfileMetrics], pred: impl Fn(&ProfileMetrics) -> bool) -> Vec<ProfileId> {
    metrics.iter().filter(|m| pred(m)).map(|m| m.profile_id).collect()
}
