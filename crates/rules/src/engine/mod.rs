//! The matching engine: every enabled profile against each killmail.
//!
//! The engine owns nothing but a handle to the current registry snapshot,
//! its counters, and an optional [`MatchSink`]. `evaluate` takes one snapshot
//! at call start and fans the profiles out over rayon; `reload` rebuilds the
//! registry from the profile store and swaps it in.

mod stats;

#[cfg(test)]
mod tests;

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use killwatch_core::config::EngineConfig;
use killwatch_core::{KillmailFact, MatchResult, MatchSink, ProfileId};

use crate::evaluator::evaluate_with_deadline;
use crate::profile::CompiledProfile;
use crate::registry::{ProfileRegistry, RegistryHandle};
use crate::store::{ProfileStore, ProfileStoreError};

pub use stats::EngineStats;

/// What a successful reload swapped in.
#[derive(Debug, Clone, Serialize)]
pub struct ReloadSummary {
    pub generation: u64,
    pub profiles_loaded: usize,
    /// Profiles whose criteria have no valid leaf and can never match.
    pub unmatchable: usize,
    /// Criteria nodes degraded to non-match across all profiles.
    pub degraded_nodes: usize,
    pub loaded_at: DateTime<Utc>,
}

/// Per-profile result of one evaluation.
#[derive(Debug)]
enum ProfileOutcome {
    Matched(MatchResult),
    NoMatch,
    TimedOut { profile_id: ProfileId, visited: usize },
    Panicked { profile_id: ProfileId, message: String },
}

pub struct MatchingEngine {
    store: Arc<dyn ProfileStore>,
    registry: Arc<RegistryHandle>,
    sink: Option<Arc<dyn MatchSink>>,
    stats: Mutex<EngineStats>,
    generation: AtomicU64,
    /// Held from the store read through the swap.
    reload_lock: Mutex<()>,
    config: EngineConfig,
}

impl MatchingEngine {
    /// Create an engine with an empty registry. Call [`reload`](Self::reload)
    /// before evaluating.
    pub fn new(store: Arc<dyn ProfileStore>, config: EngineConfig) -> Self {
        Self::with_registry(store, Arc::new(RegistryHandle::default()), config)
    }

    /// Create an engine over an existing, possibly shared, registry handle.
    pub fn with_registry(
        store: Arc<dyn ProfileStore>,
        registry: Arc<RegistryHandle>,
        config: EngineConfig,
    ) -> Self {
        let generation = registry.snapshot().generation();
        Self {
            store,
            registry,
            sink: None,
            stats: Mutex::new(EngineStats::default()),
            generation: AtomicU64::new(generation),
            reload_lock: Mutex::new(()),
            config,
        }
    }

    /// Forward every non-empty batch of match results to `sink`.
    pub fn with_sink(mut self, sink: Arc<dyn MatchSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Rebuild the registry from the profile store and swap it in.
    ///
    /// On store failure the current snapshot stays in place and the error is
    /// returned. Concurrent reloads run one after another, so the last one to
    /// finish always installs the newest store contents.
    pub fn reload(&self) -> Result<ReloadSummary, ProfileStoreError> {
        let _serial = self.reload_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let started = Instant::now();

        let profiles = match self.store.list_enabled_profiles() {
            Ok(p) => p,
            Err(e) => {
                self.stats_mut().failed_reloads += 1;
                error!(error = %e, "profile reload failed, keeping previous registry");
                return Err(e);
            }
        };

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let registry = ProfileRegistry::build(profiles, generation);

        let summary = ReloadSummary {
            generation,
            profiles_loaded: registry.len(),
            unmatchable: registry
                .profiles()
                .iter()
                .filter(|p| !p.criteria.is_matchable())
                .count(),
            degraded_nodes: registry
                .profiles()
                .iter()
                .map(|p| p.criteria.invalid_count)
                .sum(),
            loaded_at: registry.loaded_at(),
        };

        self.registry.swap(registry);
        self.stats_mut()
            .record_reload(summary.profiles_loaded, summary.loaded_at);

        info!(
            generation,
            profiles = summary.profiles_loaded,
            unmatchable = summary.unmatchable,
            degraded_nodes = summary.degraded_nodes,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "profile registry reloaded"
        );
        Ok(summary)
    }

    /// Evaluate `fact` against every profile in the current snapshot.
    ///
    /// Profiles that panic or exceed the per-profile budget are logged and
    /// left out; the rest are unaffected.
    pub fn evaluate(&self, fact: &KillmailFact) -> Vec<MatchResult> {
        let snapshot = self.registry.snapshot();
        let started = Instant::now();
        let matched_at = Utc::now();
        let budget = self.config.profile_timeout();

        let outcomes: Vec<ProfileOutcome> = snapshot
            .profiles()
            .par_iter()
            .map(|profile| run_profile(profile, fact, budget, matched_at))
            .collect();

        let mut results = Vec::new();
        let mut timeouts = 0;
        let mut failures = 0;
        for outcome in outcomes {
            match outcome {
                ProfileOutcome::Matched(result) => results.push(result),
                ProfileOutcome::NoMatch => {}
                ProfileOutcome::TimedOut { profile_id, visited } => {
                    timeouts += 1;
                    warn!(
                        profile_id,
                        killmail_id = fact.killmail_id,
                        visited,
                        budget_ms = budget.as_millis() as u64,
                        "profile evaluation timed out"
                    );
                }
                ProfileOutcome::Panicked { profile_id, message } => {
                    failures += 1;
                    error!(
                        profile_id,
                        killmail_id = fact.killmail_id,
                        panic = %message,
                        "profile evaluation panicked"
                    );
                }
            }
        }

        let elapsed = started.elapsed();
        let slow = elapsed > self.config.slow_killmail();
        if slow {
            warn!(
                killmail_id = fact.killmail_id,
                profiles = snapshot.len(),
                elapsed_ms = elapsed.as_millis() as u64,
                "slow killmail evaluation"
            );
        }

        {
            let mut stats = self.stats_mut();
            stats.record_killmail(elapsed, results.len(), slow);
            stats.profile_timeouts += timeouts;
            stats.profile_failures += failures;
        }

        debug!(
            killmail_id = fact.killmail_id,
            generation = snapshot.generation(),
            matches = results.len(),
            "killmail evaluated"
        );

        if !results.is_empty() {
            if let Some(sink) = &self.sink {
                sink.publish(Arc::new(fact.clone()), &results);
            }
        }
        results
    }

    /// Copy of the current counters. `profiles_loaded` reflects the live snapshot.
    pub fn get_stats(&self) -> EngineStats {
        let mut stats = self.stats_mut().clone();
        stats.profiles_loaded = self.registry.snapshot().len();
        stats
    }

    pub fn snapshot(&self) -> Arc<ProfileRegistry> {
        self.registry.snapshot()
    }

    pub fn registry(&self) -> &Arc<RegistryHandle> {
        &self.registry
    }

    fn stats_mut(&self) -> std::sync::MutexGuard<'_, EngineStats> {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn run_profile(
    profile: &CompiledProfile,
    fact: &KillmailFact,
    budget: Duration,
    matched_at: DateTime<Utc>,
) -> ProfileOutcome {
    let profile_id = profile.id();
    let outcome = guarded(|| {
        let deadline = Instant::now().checked_add(budget);
        match evaluate_with_deadline(&profile.criteria, fact, deadline) {
            Ok(eval) if eval.matched => ProfileOutcome::Matched(MatchResult {
                profile_id,
                profile_name: profile.name().to_string(),
                killmail_id: fact.killmail_id,
                matched_at,
                confidence_score: eval.confidence,
                matched_leaves: eval.matched_leaves,
            }),
            Ok(_) => ProfileOutcome::NoMatch,
            Err(e) => ProfileOutcome::TimedOut {
                profile_id,
                visited: e.visited,
            },
        }
    });
    outcome.unwrap_or_else(|message| ProfileOutcome::Panicked { profile_id, message })
}

/// Run `f`, turning a panic into its message.
fn guarded<T>(f: impl FnOnce() -> T) -> Result<T, String> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| panic_message(payload.as_ref()))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
