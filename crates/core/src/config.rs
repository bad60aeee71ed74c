use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_parse<T: FromStr>(profile: &str, key: &str, default: T) -> T {
    match profiled_env_opt(profile, key) {
        Some(raw) => match raw.parse() {
            Ok(v) => v,
            Err(_) => {
                tracing::warn!(key, value = %raw, "unparseable config value, using default");
                default
            }
        },
        None => default,
    }
}

fn profiled_env_bool(profile: &str, key: &str, default: bool) -> bool {
    match profiled_env_opt(profile, key) {
        Some(v) => matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        None => default,
    }
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KillwatchConfig {
    /// Active profile name (empty = default).
    pub profile: String,
    pub engine: EngineConfig,
    pub pipeline: PipelineConfig,
    pub metrics: MetricsConfig,
}

impl KillwatchConfig {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `KILLWATCH_PROFILE`. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("KILLWATCH_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            engine: EngineConfig::from_env_profiled(p),
            pipeline: PipelineConfig::from_env_profiled(p),
            metrics: MetricsConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!(
            "  engine:    profiles_dir={}, watch={}, profile_timeout={}ms, slow_killmail={}ms",
            self.engine.profiles_dir.display(),
            self.engine.watch_profiles,
            self.engine.profile_timeout_ms,
            self.engine.slow_killmail_ms
        );
        tracing::info!(
            "  pipeline:  queue_capacity={}, workers={}, default_webhook={}, templates={}",
            self.pipeline.queue_capacity,
            self.pipeline.workers,
            if self.pipeline.default_webhook_url.is_some() { "set" } else { "(none)" },
            match (&self.pipeline.subject_template, &self.pipeline.body_template) {
                (None, None) => "default",
                _ => "custom",
            }
        );
        tracing::info!(
            "  metrics:   window={}h, killmails/h={}, low_perf<{}, high_fp>{}, response>{}ms",
            self.metrics.window_hours,
            self.metrics.estimated_killmails_per_hour,
            self.metrics.low_performance_threshold,
            self.metrics.high_false_positive_threshold,
            self.metrics.response_time_threshold_ms
        );
    }
}

// ── Matching engine ───────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Directory holding profile documents for the directory-backed store.
    pub profiles_dir: PathBuf,
    /// Reload the registry when files under `profiles_dir` change.
    pub watch_profiles: bool,
    /// Wall-clock budget for one profile against one killmail.
    pub profile_timeout_ms: u64,
    /// Killmails taking longer than this across all profiles are logged as slow.
    pub slow_killmail_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            profiles_dir: PathBuf::from("data/profiles"),
            watch_profiles: true,
            profile_timeout_ms: 50,
            slow_killmail_ms: 200,
        }
    }
}

impl EngineConfig {
    fn from_env_profiled(p: &str) -> Self {
        let d = Self::default();
        Self {
            profiles_dir: PathBuf::from(profiled_env_or(
                p,
                "PROFILES_DIR",
                d.profiles_dir.to_str().unwrap_or("data/profiles"),
            )),
            watch_profiles: profiled_env_bool(p, "WATCH_PROFILES", d.watch_profiles),
            profile_timeout_ms: profiled_env_parse(p, "PROFILE_TIMEOUT_MS", d.profile_timeout_ms),
            slow_killmail_ms: profiled_env_parse(p, "SLOW_KILLMAIL_MS", d.slow_killmail_ms),
        }
    }

    pub fn profile_timeout(&self) -> Duration {
        Duration::from_millis(self.profile_timeout_ms)
    }

    pub fn slow_killmail(&self) -> Duration {
        Duration::from_millis(self.slow_killmail_ms)
    }
}

// ── Alert pipeline ────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Bounded queue between the engine and the alert workers.
    pub queue_capacity: usize,
    /// Maximum alert jobs processed concurrently.
    pub workers: usize,
    /// Webhook used for profiles without their own channels.
    pub default_webhook_url: Option<String>,
    /// Minijinja template for alert subjects. Built-in default when unset.
    pub subject_template: Option<String>,
    /// Minijinja template for alert bodies. Built-in default when unset.
    pub body_template: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            workers: 4,
            default_webhook_url: None,
            subject_template: None,
            body_template: None,
        }
    }
}

impl PipelineConfig {
    fn from_env_profiled(p: &str) -> Self {
        let d = Self::default();
        Self {
            queue_capacity: profiled_env_parse(p, "ALERT_QUEUE_CAPACITY", d.queue_capacity).max(1),
            workers: profiled_env_parse(p, "ALERT_WORKERS", d.workers).max(1),
            default_webhook_url: profiled_env_opt(p, "DEFAULT_WEBHOOK_URL"),
            subject_template: profiled_env_opt(p, "ALERT_SUBJECT_TEMPLATE"),
            body_template: profiled_env_opt(p, "ALERT_BODY_TEMPLATE"),
        }
    }
}

// ── Metrics & recommendations ─────────────────────────────────

/// Ten years.
pub const MAX_WINDOW_HOURS: i64 = 87_600;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Default lookback for dashboard metrics.
    pub window_hours: i64,
    /// Baseline used as the denominator of `match_rate`.
    pub estimated_killmails_per_hour: f64,
    /// Profiles scoring below this get a "low performance" recommendation.
    pub low_performance_threshold: f64,
    /// Profiles whose estimated false-positive rate exceeds this get flagged.
    pub high_false_positive_threshold: f64,
    /// Average killmail evaluation time that counts as degraded.
    pub response_time_threshold_ms: f64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            window_hours: 24,
            estimated_killmails_per_hour: 1500.0,
            low_performance_threshold: 30.0,
            high_false_positive_threshold: 8.0,
            response_time_threshold_ms: 200.0,
        }
    }
}

impl MetricsConfig {
    fn from_env_profiled(p: &str) -> Self {
        let d = Self::default();
        Self {
            window_hours: profiled_env_parse(p, "METRICS_WINDOW_HOURS", d.window_hours)
                .clamp(1, MAX_WINDOW_HOURS),
            estimated_killmails_per_hour: profiled_env_parse(
                p,
                "ESTIMATED_KILLMAILS_PER_HOUR",
                d.estimated_killmails_per_hour,
            ),
            low_performance_threshold: profiled_env_parse(
                p,
                "LOW_PERFORMANCE_THRESHOLD",
                d.low_performance_threshold,
            ),
            high_false_positive_threshold: profiled_env_parse(
                p,
                "HIGH_FALSE_POSITIVE_THRESHOLD",
                d.high_false_positive_threshold,
            ),
            response_time_threshold_ms: profiled_env_parse(
                p,
                "RESPONSE_TIME_THRESHOLD_MS",
                d.response_time_threshold_ms,
            ),
        }
    }
}
