use std::sync::atomic::AtomicBool;

use serde_json::{json, Value};

use killwatch_core::KillmailFact;

use super::*;
use crate::profile::Profile;
use crate::store::MemoryProfileStore;

fn whale_profile(id: ProfileId) -> Profile {
    Profile::new(
        id,
        format!("whales-{}", id),
        json!({
            "condition": "and",
            "rules": [
                {"field": "total_value", "operator": "gt", "value": 100_000_000},
                {"field": "solar_system_id", "operator": "in", "value": [30000142, 30002187]}
            ]
        }),
    )
}

fn solo_profile(id: ProfileId) -> Profile {
    Profile::new(
        id,
        "solo",
        json!({"field": "is_solo", "operator": "eq", "value": true}),
    )
}

fn fact(total_value: f64) -> KillmailFact {
    KillmailFact {
        killmail_id: 123,
        total_value: Some(total_value),
        solar_system_id: Some(30000142),
        ..Default::default()
    }
}

fn engine_with(store: Arc<MemoryProfileStore>) -> MatchingEngine {
    let engine = MatchingEngine::new(store, EngineConfig::default());
    engine.reload().unwrap();
    engine
}

#[derive(Default)]
struct CapturingSink {
    batches: Mutex<Vec<(i64, usize)>>,
}

impl MatchSink for CapturingSink {
    fn publish(&self, fact: Arc<KillmailFact>, results: &[MatchResult]) {
        self.batches.lock().unwrap().push((fact.killmail_id, results.len()));
    }
}

/// Store that can be switched into a failing state.
#[derive(Default)]
struct FlakyStore {
    inner: MemoryProfileStore,
    failing: AtomicBool,
}

impl ProfileStore for FlakyStore {
    fn list_profiles(&self) -> crate::store::Result<Vec<Profile>> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ProfileStoreError::Unavailable("database offline".into()));
        }
        self.inner.list_profiles()
    }
}

/// Flips between two disjoint profile sets (ids 1-4 and 11-14) on every read.
#[derive(Default)]
struct AlternatingStore {
    reads: AtomicU64,
}

impl ProfileStore for AlternatingStore {
    fn list_profiles(&self) -> crate::store::Result<Vec<Profile>> {
        let base = if self.reads.fetch_add(1, Ordering::SeqCst) % 2 == 0 { 1 } else { 11 };
        Ok((base..base + 4).map(whale_profile).collect())
    }
}

/// Names its single profile after the read number. The first read stalls.
#[derive(Default)]
struct StallingStore {
    reads: AtomicU64,
}

impl ProfileStore for StallingStore {
    fn list_profiles(&self) -> crate::store::Result<Vec<Profile>> {
        let read = self.reads.fetch_add(1, Ordering::SeqCst) + 1;
        if read == 1 {
            std::thread::sleep(Duration::from_millis(100));
        }
        let mut profile = whale_profile(1);
        profile.name = format!("read-{read}");
        Ok(vec![profile])
    }
}

/// One flat OR over `leaves` leaves that all miss.
fn sprawling_profile(id: ProfileId, leaves: usize) -> Profile {
    let rules: Vec<Value> = (0..leaves)
        .map(|i| json!({"field": "attacker_count", "operator": "eq", "value": i}))
        .collect();
    Profile::new(id, "sprawling", json!({"or": rules}))
}

#[test]
fn matching_killmail_yields_full_confidence() {
    let store = Arc::new(MemoryProfileStore::with_profiles([whale_profile(1)]));
    let engine = engine_with(store);

    let results = engine.evaluate(&fact(250_000_000.0));
    assert_eq!(results.len(), 1);
    let r = &results[0];
    assert_eq!(r.profile_id, 1);
    assert_eq!(r.profile_name, "whales-1");
    assert_eq!(r.killmail_id, 123);
    assert_eq!(r.confidence_score, 1.0);
    assert_eq!(r.matched_leaves, vec![0, 1]);
}

#[test]
fn non_matching_killmail_yields_nothing() {
    let store = Arc::new(MemoryProfileStore::with_profiles([whale_profile(1)]));
    let engine = engine_with(store);
    assert!(engine.evaluate(&fact(50_000_000.0)).is_empty());

    let stats = engine.get_stats();
    assert_eq!(stats.killmails_processed, 1);
    assert_eq!(stats.matches_processed, 0);
}

#[test]
fn results_share_one_timestamp() {
    let store = Arc::new(MemoryProfileStore::with_profiles(
        (1..=8).map(whale_profile),
    ));
    let engine = engine_with(store);
    let results = engine.evaluate(&fact(250_000_000.0));
    assert_eq!(results.len(), 8);
    assert!(results.iter().all(|r| r.matched_at == results[0].matched_at));
}

#[test]
fn disabled_profile_drops_out_after_reload() {
    let store = Arc::new(MemoryProfileStore::with_profiles([
        whale_profile(1),
        whale_profile(2),
    ]));
    let engine = engine_with(Arc::clone(&store));
    assert_eq!(engine.evaluate(&fact(250_000_000.0)).len(), 2);

    store.set_enabled(2, false).unwrap();
    // Not visible until reload.
    assert_eq!(engine.evaluate(&fact(250_000_000.0)).len(), 2);

    engine.reload().unwrap();
    let results = engine.evaluate(&fact(250_000_000.0));
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].profile_id, 1);
    assert_eq!(engine.get_stats().profiles_loaded, 1);
}

#[test]
fn failed_reload_keeps_previous_snapshot() {
    let store = Arc::new(FlakyStore::default());
    store.inner.upsert(whale_profile(1));
    let engine = MatchingEngine::new(store.clone(), EngineConfig::default());
    let first = engine.reload().unwrap();
    assert_eq!(first.generation, 1);

    store.failing.store(true, Ordering::SeqCst);
    store.inner.upsert(whale_profile(2));
    assert!(matches!(engine.reload(), Err(ProfileStoreError::Unavailable(_))));

    assert_eq!(engine.snapshot().generation(), 1);
    assert_eq!(engine.evaluate(&fact(250_000_000.0)).len(), 1);
    let stats = engine.get_stats();
    assert_eq!(stats.reloads, 1);
    assert_eq!(stats.failed_reloads, 1);
}

#[test]
fn reload_reports_unmatchable_profiles() {
    let broken = Profile::new(9, "broken", json!({"field": "victim_name", "operator": "eq", "value": "x"}));
    let store = Arc::new(MemoryProfileStore::with_profiles([whale_profile(1), broken]));
    let engine = MatchingEngine::new(store, EngineConfig::default());

    let summary = engine.reload().unwrap();
    assert_eq!(summary.profiles_loaded, 2);
    assert_eq!(summary.unmatchable, 1);
    assert_eq!(summary.degraded_nodes, 1);

    let results = engine.evaluate(&fact(250_000_000.0));
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].profile_id, 1);
}

#[test]
fn held_snapshot_is_stable_across_reload() {
    let store = Arc::new(MemoryProfileStore::with_profiles([whale_profile(1)]));
    let engine = engine_with(Arc::clone(&store));
    let held = engine.snapshot();

    store.upsert(whale_profile(2));
    engine.reload().unwrap();

    assert_eq!(held.len(), 1);
    assert_eq!(engine.snapshot().len(), 2);
}

#[test]
fn zero_budget_times_out_every_profile() {
    let store = Arc::new(MemoryProfileStore::with_profiles([
        whale_profile(1),
        solo_profile(2),
    ]));
    let config = EngineConfig {
        profile_timeout_ms: 0,
        ..EngineConfig::default()
    };
    let engine = MatchingEngine::new(store, config);
    engine.reload().unwrap();

    assert!(engine.evaluate(&fact(250_000_000.0)).is_empty());
    assert_eq!(engine.get_stats().profile_timeouts, 2);
}

#[test]
fn timed_out_profile_is_dropped_while_others_match() {
    let store = Arc::new(MemoryProfileStore::with_profiles([
        sprawling_profile(1, 400_000),
        whale_profile(2),
    ]));
    let config = EngineConfig {
        profile_timeout_ms: 1,
        ..EngineConfig::default()
    };
    let engine = MatchingEngine::new(store, config);
    engine.reload().unwrap();

    let results = engine.evaluate(&fact(250_000_000.0));
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].profile_id, 2);
    assert_eq!(results[0].confidence_score, 1.0);

    let stats = engine.get_stats();
    assert_eq!(stats.profile_timeouts, 1);
    assert_eq!(stats.matches_processed, 1);
}

#[test]
fn evaluate_sees_a_single_generation_during_reloads() {
    let config = EngineConfig {
        profile_timeout_ms: 5_000,
        ..EngineConfig::default()
    };
    let engine = MatchingEngine::new(Arc::new(AlternatingStore::default()), config);
    engine.reload().unwrap();
    let done = AtomicBool::new(false);

    std::thread::scope(|s| {
        s.spawn(|| {
            for _ in 0..200 {
                engine.reload().unwrap();
            }
            done.store(true, Ordering::SeqCst);
        });
        for _ in 0..3 {
            s.spawn(|| {
                let mut rounds = 0;
                while rounds == 0 || !done.load(Ordering::SeqCst) {
                    let results = engine.evaluate(&fact(250_000_000.0));
                    let ids: Vec<ProfileId> = results.iter().map(|r| r.profile_id).collect();
                    assert_eq!(ids.len(), 4, "partial registry: {ids:?}");
                    let low = ids[0] < 10;
                    assert!(ids.iter().all(|id| (*id < 10) == low), "mixed generations: {ids:?}");
                    rounds += 1;
                }
            });
        }
    });

    assert_eq!(engine.snapshot().generation(), 201);
    assert_eq!(engine.get_stats().reloads, 201);
}

#[test]
fn overlapping_reloads_install_the_newest_read() {
    let store = Arc::new(StallingStore::default());
    let engine = MatchingEngine::new(store.clone(), EngineConfig::default());

    std::thread::scope(|s| {
        let slow = s.spawn(|| engine.reload().unwrap());
        while store.reads.load(Ordering::SeqCst) == 0 {
            std::thread::yield_now();
        }
        let fast = engine.reload().unwrap();
        let slow = slow.join().unwrap();
        assert!(fast.generation > slow.generation);
    });

    let snapshot = engine.snapshot();
    assert_eq!(snapshot.generation(), 2);
    assert_eq!(snapshot.profiles()[0].name(), "read-2");
}

#[test]
fn guarded_isolates_panics() {
    let ok = guarded(|| 7);
    assert_eq!(ok, Ok(7));

    let err = guarded(|| -> u32 { panic!("criteria blew up") });
    assert_eq!(err, Err("criteria blew up".to_string()));

    let id = 5;
    let err = guarded(|| -> u32 { panic!("profile {} blew up", id) });
    assert_eq!(err, Err("profile 5 blew up".to_string()));
}

#[test]
fn sink_receives_only_non_empty_batches() {
    let store = Arc::new(MemoryProfileStore::with_profiles([whale_profile(1), solo_profile(2)]));
    let sink = Arc::new(CapturingSink::default());
    let engine = MatchingEngine::new(store, EngineConfig::default()).with_sink(sink.clone());
    engine.reload().unwrap();

    engine.evaluate(&fact(250_000_000.0));
    engine.evaluate(&fact(1.0));

    let batches = sink.batches.lock().unwrap();
    assert_eq!(*batches, vec![(123, 1)]);
}

#[test]
fn stats_track_matches() {
    let store = Arc::new(MemoryProfileStore::with_profiles([whale_profile(1), whale_profile(2)]));
    let engine = engine_with(store);
    engine.evaluate(&fact(250_000_000.0));
    engine.evaluate(&fact(250_000_000.0));

    let stats = engine.get_stats();
    assert_eq!(stats.profiles_loaded, 2);
    assert_eq!(stats.killmails_processed, 2);
    assert_eq!(stats.matches_processed, 4);
    assert!(stats.last_reload_at.is_some());
}
