//! Integration tests that load every example profile in
//! `data/profiles/examples/` and run them through the engine.

use std::sync::Arc;

use killwatch_core::config::EngineConfig;
use killwatch_core::KillmailFact;
use killwatch_rules::store::LoadStatus;
use killwatch_rules::{ChannelKind, DirectoryProfileStore, MatchingEngine, ProfileStore};

/// Resolve the examples directory relative to the workspace root.
/// Integration tests run from the crate directory, so we go up two levels.
fn examples_dir() -> std::path::PathBuf {
    let manifest = std::path::Path::new(env!("CARGO_MANIFEST_DIR"));
    manifest.join("../../data/profiles/examples")
}

fn engine() -> MatchingEngine {
    let store = Arc::new(DirectoryProfileStore::new(examples_dir()));
    let engine = MatchingEngine::new(store, EngineConfig::default());
    engine.reload().expect("reload example profiles");
    engine
}

#[test]
fn all_examples_load_cleanly() {
    let store = DirectoryProfileStore::new(examples_dir());
    let (profiles, results) = store.scan().unwrap();

    assert_eq!(profiles.len(), 3);
    for r in &results {
        assert!(
            matches!(r.status, LoadStatus::Loaded { .. }),
            "{} did not load: {:?}",
            r.path.display(),
            r.status
        );
    }

    let enabled = store.list_enabled_profiles().unwrap();
    assert_eq!(enabled.len(), 2);
}

#[test]
fn example_criteria_compile_without_issues() {
    let engine = engine();
    let snapshot = engine.snapshot();
    for profile in snapshot.profiles() {
        assert!(
            profile.criteria.issues.is_empty(),
            "profile {} has issues: {:?}",
            profile.id(),
            profile.criteria.issues
        );
    }
    let whales = snapshot.get(1001).unwrap();
    assert_eq!(whales.profile.notifications[0].channel, ChannelKind::Webhook);
    assert_eq!(whales.criteria.leaf_count, 2);
}

#[test]
fn expensive_jita_loss_matches_whales() {
    let fact = KillmailFact {
        killmail_id: 1,
        total_value: Some(4_200_000_000.0),
        solar_system_id: Some(30000142),
        attacker_count: Some(1),
        is_npc: Some(false),
        ..Default::default()
    };
    let results = engine().evaluate(&fact);
    let ids: Vec<_> = results.iter().map(|r| r.profile_id).collect();
    assert_eq!(ids, vec![1001]);
    assert_eq!(results[0].confidence_score, 1.0);
}

#[test]
fn gang_kill_matches_alliance_watch_partially() {
    let fact = KillmailFact {
        killmail_id: 2,
        total_value: Some(80_000_000.0),
        solar_system_id: Some(30002813),
        attacker_count: Some(12),
        attacker_alliance_ids: vec![99000500],
        is_npc: Some(false),
        ..Default::default()
    };
    let results = engine().evaluate(&fact);
    assert_eq!(results.len(), 1);
    let r = &results[0];
    assert_eq!(r.profile_id, 1002);
    // alliance leaf (weight 2) missed; range and not-npc leaves support the match
    assert_eq!(r.confidence_score, 0.5);
    assert_eq!(r.matched_leaves, vec![1, 2]);
}
