//! Per-profile usefulness metrics derived from alert history.
//!
//! Everything here is recomputed on read and never persisted.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use killwatch_core::{Alert, ProfileId};
use killwatch_rules::{CompiledCriteria, Profile};

/// Half-open time range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// The `hours` leading up to now. Lookbacks past the earliest
    /// representable time start there instead.
    pub fn last_hours(hours: i64) -> Self {
        let end = Utc::now();
        let start = Duration::try_hours(hours.max(1))
            .and_then(|span| end.checked_sub_signed(span))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        Self { start, end }
    }

    /// Window length in hours, never below one minute's worth.
    pub fn hours(&self) -> f64 {
        let secs = (self.end - self.start).num_seconds().max(60);
        secs as f64 / 3600.0
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at >= self.start && at < self.end
    }
}

/// The profile attributes the metrics need.
#[derive(Debug, Clone, Serialize)]
pub struct ProfileSummary {
    pub id: ProfileId,
    pub name: String,
    pub enabled: bool,
    /// Valid leaves in the compiled criteria.
    pub leaf_count: usize,
}

impl From<&Profile> for ProfileSummary {
    fn from(profile: &Profile) -> Self {
        let criteria = CompiledCriteria::compile(&profile.criteria);
        Self {
            id: profile.id,
            name: profile.name.clone(),
            enabled: profile.enabled,
            leaf_count: criteria.leaf_count,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfileMetrics {
    pub profile_id: ProfileId,
    pub profile_name: String,
    pub enabled: bool,
    pub alerts_generated: u64,
    pub match_rate: f64,
    pub false_positive_rate: f64,
    pub avg_confidence: f64,
    pub performance_score: f64,
    pub criteria_efficiency: f64,
}

impl ProfileMetrics {
    /// Compute metrics for one profile. `alerts` may contain other
    /// profiles' alerts and alerts outside `window`; both are ignored.
    pub fn compute(
        profile: &ProfileSummary,
        alerts: &[Alert],
        window: &TimeWindow,
        estimated_killmails_per_hour: f64,
    ) -> Self {
        let mut count = 0u64;
        let mut confidence_sum = 0.0;
        let mut efficiency_sum = 0.0;
        for alert in alerts
            .iter()
            .filter(|a| a.profile_id == profile.id && window.contains(a.created_at))
        {
            count += 1;
            confidence_sum += alert.confidence_score;
            efficiency_sum += leaf_efficiency(alert.matched_leaves.len(), profile.leaf_count);
        }

        let (avg_confidence, criteria_efficiency) = if count == 0 {
            (0.0, 0.0)
        } else {
            (confidence_sum / count as f64, efficiency_sum / count as f64)
        };
        let fp = false_positive_rate(profile.leaf_count);

        Self {
            profile_id: profile.id,
            profile_name: profile.name.clone(),
            enabled: profile.enabled,
            alerts_generated: count,
            match_rate: match_rate(count, window, estimated_killmails_per_hour),
            false_positive_rate: fp,
            avg_confidence,
            performance_score: performance_score(count, avg_confidence, fp),
            criteria_efficiency,
        }
    }
}

// ── Formulas ──────────────────────────────────────────────────

/// Complexity heuristic in `[1, 10]`: every extra leaf lowers the estimate.
pub fn false_positive_rate(leaf_count: usize) -> f64 {
    (11.0 - leaf_count as f64).clamp(1.0, 10.0)
}

/// `min(alerts*2, 40) + avg_confidence*30 + max(0, 30 - fp)`.
pub fn performance_score(alerts_generated: u64, avg_confidence: f64, false_positive_rate: f64) -> f64 {
    let volume = (alerts_generated as f64 * 2.0).min(40.0);
    let confidence = avg_confidence.clamp(0.0, 1.0) * 30.0;
    let precision = (30.0 - false_positive_rate).max(0.0);
    volume + confidence + precision
}

/// Alerts per estimated killmail seen in the window.
pub fn match_rate(alerts_generated: u64, window: &TimeWindow, estimated_killmails_per_hour: f64) -> f64 {
    let expected = window.hours() * estimated_killmails_per_hour;
    if expected <= 0.0 {
        return 0.0;
    }
    alerts_generated as f64 / expected
}

fn leaf_efficiency(matched: usize, leaf_count: usize) -> f64 {
    if leaf_count == 0 {
        return 0.0;
    }
    (matched as f64 / leaf_count as f64).min(1.0)
}
