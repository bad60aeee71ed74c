use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Matching engine operational counters.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EngineStats {
    /// Profiles in the current registry snapshot.
    pub profiles_loaded: usize,
    pub killmails_processed: u64,
    /// Match results produced across all killmails.
    pub matches_processed: u64,
    /// Mean wall time to evaluate one killmail against every profile.
    pub avg_eval_time: Duration,
    pub max_eval_time: Duration,
    /// Profile evaluations that panicked.
    pub profile_failures: u64,
    /// Profile evaluations abandoned at their deadline.
    pub profile_timeouts: u64,
    /// Killmails slower than the configured soft target.
    pub slow_evaluations: u64,
    pub reloads: u64,
    pub failed_reloads: u64,
    pub last_reload_at: Option<DateTime<Utc>>,
}

impl EngineStats {
    /// Record one killmail evaluation.
    pub fn record_killmail(&mut self, elapsed: Duration, matches: usize, slow: bool) {
        self.killmails_processed += 1;
        self.matches_processed += matches as u64;
        if slow {
            self.slow_evaluations += 1;
        }
        if elapsed > self.max_eval_time {
            self.max_eval_time = elapsed;
        }

        // Incremental mean: new_avg = prev_avg + (elapsed - prev_avg) / count
        let count = self.killmails_processed;
        self.avg_eval_time = if count == 1 {
            elapsed
        } else {
            let prev = self.avg_eval_time.as_nanos() as f64;
            let cur = elapsed.as_nanos() as f64;
            Duration::from_nanos((prev + (cur - prev) / count as f64) as u64)
        };
    }

    pub fn record_reload(&mut self, profiles_loaded: usize, at: DateTime<Utc>) {
        self.reloads += 1;
        self.profiles_loaded = profiles_loaded;
        self.last_reload_at = Some(at);
    }

    pub fn avg_eval_ms(&self) -> f64 {
        self.avg_eval_time.as_secs_f64() * 1000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn averages_eval_time() {
        let mut s = EngineStats::default();
        s.record_killmail(Duration::from_millis(100), 1, false);
        s.record_killmail(Duration::from_millis(200), 0, true);

        assert_eq!(s.killmails_processed, 2);
        assert_eq!(s.matches_processed, 1);
        assert_eq!(s.slow_evaluations, 1);
        assert_eq!(s.max_eval_time, Duration::from_millis(200));
        let avg = s.avg_eval_time.as_millis();
        assert!((140..=160).contains(&avg), "expected ~150ms, got {}ms", avg);
    }

    #[test]
    fn default_stats_are_zeroed() {
        let s = EngineStats::default();
        assert_eq!(s.profiles_loaded, 0);
        assert_eq!(s.avg_eval_ms(), 0.0);
        assert!(s.last_reload_at.is_none());
    }
}
