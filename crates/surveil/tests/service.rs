//! End-to-end: profiles in, killmails evaluated, alerts recorded and
//! delivered, metrics and lifecycle operations on top.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::json;
use tokio::sync::Notify;

use killwatch_alerts::{AlertQuery, InMemoryAlertStore, RecommendationKind};
use killwatch_core::{AlertState, KillmailFact, KillwatchConfig};
use killwatch_notify::{AlertPipeline, AlertQueue, Dispatcher, Notification, Notifier, NotifyError};
use killwatch_rules::{MemoryProfileStore, Profile};
use killwatch_surveil::{ServiceError, SurveillanceService};

struct CountingNotifier {
    sent: Arc<AtomicUsize>,
}

#[async_trait::async_trait]
impl Notifier for CountingNotifier {
    async fn send(&self, _notification: &Notification) -> Result<(), NotifyError> {
        self.sent.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "counting"
    }
}

fn profiles() -> Vec<Profile> {
    let whales = Profile::new(
        1,
        "Jita whales",
        json!({"and": [
            {"field": "total_value", "operator": "greater_than", "value": 1_000_000_000.0},
            {"field": "solar_system_id", "operator": "equals", "value": 30000142}
        ]}),
    );
    let mut dormant = Profile::new(
        2,
        "Dormant",
        json!({"field": "is_npc", "operator": "equals", "value": true}),
    );
    dormant.enabled = false;
    vec![whales, dormant]
}

fn whale_kill(killmail_id: i64) -> KillmailFact {
    KillmailFact {
        killmail_id,
        total_value: Some(5e9),
        solar_system_id: Some(30000142),
        is_npc: Some(true),
        ..Default::default()
    }
}

struct Harness {
    store: Arc<MemoryProfileStore>,
    service: Arc<SurveillanceService>,
    alerts: Arc<InMemoryAlertStore>,
    sent: Arc<AtomicUsize>,
    pipeline: Arc<AlertPipeline>,
    queue_rx: Option<tokio::sync::mpsc::Receiver<killwatch_notify::AlertJob>>,
}

fn harness() -> Harness {
    let store = Arc::new(MemoryProfileStore::with_profiles(profiles()));
    let alerts = Arc::new(InMemoryAlertStore::new());
    let (queue, queue_rx) = AlertQueue::bounded(16);

    let service = Arc::new(
        SurveillanceService::new(store.clone(), alerts.clone(), &KillwatchConfig::default())
            .with_sink(Arc::new(queue)),
    );
    let summary = service.reload().unwrap();
    assert_eq!(summary.profiles_loaded, 1);

    // Reload builds real channels; swap in a counting one afterwards.
    let sent = Arc::new(AtomicUsize::new(0));
    service
        .dispatcher()
        .replace(Dispatcher::with_defaults(vec![Box::new(CountingNotifier {
            sent: sent.clone(),
        })]));

    let pipeline = Arc::new(
        AlertPipeline::new(alerts.clone(), service.dispatcher(), 2).with_registry(service.registry()),
    );
    Harness {
        store,
        service,
        alerts,
        sent,
        pipeline,
        queue_rx: Some(queue_rx),
    }
}

async fn run_killmails(h: &mut Harness, facts: Vec<KillmailFact>) {
    let shutdown = Arc::new(Notify::new());
    let rx = h.queue_rx.take().unwrap();
    let task = tokio::spawn(h.pipeline.clone().run(rx, shutdown.clone()));
    for fact in facts {
        h.service.evaluate(&fact);
    }
    shutdown.notify_one();
    task.await.unwrap();
}

#[tokio::test]
async fn matches_flow_into_alerts_and_notifications() {
    let mut h = harness();
    run_killmails(&mut h, vec![whale_kill(1), whale_kill(2), KillmailFact::default()]).await;

    assert_eq!(h.alerts.len(), 2);
    assert_eq!(h.sent.load(Ordering::SeqCst), 2);

    let stats = h.service.get_stats();
    assert_eq!(stats.killmails_processed, 3);
    assert_eq!(stats.matches_processed, 2);

    let recent = h.service.get_recent_alerts(&AlertQuery::default()).unwrap();
    assert_eq!(recent.len(), 2);
    assert!(recent.iter().all(|a| a.profile_id == 1 && a.state == AlertState::New));
}

#[tokio::test]
async fn metrics_cover_disabled_profiles() {
    let mut h = harness();
    run_killmails(&mut h, vec![whale_kill(1)]).await;

    let metrics = h.service.get_alert_metrics(None).unwrap();
    assert_eq!(metrics.total_alerts, 1);
    assert_eq!(metrics.profiles_triggered, 1);
    assert_eq!(metrics.profiles.len(), 2);
    assert_eq!(metrics.profiles[0].alerts_generated, 1);
    assert!(metrics
        .recommendations
        .iter()
        .any(|r| r.kind == RecommendationKind::InactiveProfiles && r.profile_ids == vec![2]));
}

#[tokio::test]
async fn bulk_acknowledge_then_resolve() {
    let mut h = harness();
    run_killmails(&mut h, vec![whale_kill(1), whale_kill(2), whale_kill(3)]).await;

    let outcome = h
        .service
        .bulk_acknowledge(&AlertQuery::for_profile(1), "fc")
        .unwrap();
    assert_eq!(outcome.selected, 3);
    assert_eq!(outcome.succeeded, 3);

    let again = h.service.bulk_acknowledge(&AlertQuery::default(), "fc").unwrap();
    assert_eq!(again.selected, 0);

    let id = h.alerts.all()[0].id;
    let resolved = h.service.resolve(id, "fc").unwrap();
    assert_eq!(resolved.state, AlertState::Resolved);
    assert!(matches!(
        h.service.acknowledge(id, "fc"),
        Err(ServiceError::Alerts(_))
    ));
}

#[tokio::test]
async fn notification_test_requires_loaded_profile() {
    let h = harness();

    let results = h.service.test_notification_delivery(1).await.unwrap();
    assert_eq!(results.len(), 1);
    assert!(results[0].success);
    assert_eq!(h.sent.load(Ordering::SeqCst), 1);

    // Disabled profiles are not loaded.
    assert!(matches!(
        h.service.test_notification_delivery(2).await,
        Err(ServiceError::UnknownProfile(2))
    ));
}

#[tokio::test]
async fn reload_rebuilds_channels() {
    let h = harness();
    h.service.reload().unwrap();
    // Counting channel replaced by the default log channel.
    let results = h.service.test_notification_delivery(1).await.unwrap();
    assert_eq!(results[0].channel, "log");
    assert_eq!(h.sent.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn disabling_a_profile_keeps_its_alerts() {
    let mut h = harness();
    run_killmails(&mut h, vec![whale_kill(1)]).await;

    h.store.set_enabled(1, false).unwrap();
    let summary = h.service.reload().unwrap();
    assert_eq!(summary.profiles_loaded, 0);
    assert!(h.service.evaluate(&whale_kill(2)).is_empty());

    let kept = h.service.get_recent_alerts(&AlertQuery::for_profile(1)).unwrap();
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].state, AlertState::New);
}
