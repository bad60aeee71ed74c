//! Alert pipeline: the queue and worker pool between the matching engine and
//! alert persistence + notification delivery.
//!
//! The engine side is [`AlertQueue`], a [`MatchSink`] that never blocks: it
//! `try_send`s onto a bounded channel and drops jobs when the queue is full.
//! [`AlertPipeline::run`] drains the channel, running at most `workers` jobs
//! at a time. Each job records the alert first, then renders and dispatches
//! the notification; delivery failures never undo the recorded alert.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::{Notify, Semaphore};
use tracing::{debug, error, info, warn};

use killwatch_core::{AlertId, AlertRecorder, KillmailFact, MatchResult, MatchSink};
use killwatch_rules::RegistryHandle;

use crate::dispatcher::DispatcherHandle;
use crate::templating::{MessageTemplates, ProfileContext, TemplateContext, TemplateRenderer};
use crate::traits::DispatchResult;

/// One match waiting to be recorded and delivered.
#[derive(Debug, Clone)]
pub struct AlertJob {
    pub result: MatchResult,
    pub fact: Arc<KillmailFact>,
}

// ── Queue (engine side) ─────────────────────────────────────────────

/// Non-blocking producer half of the alert pipeline.
pub struct AlertQueue {
    tx: mpsc::Sender<AlertJob>,
    enqueued: AtomicU64,
    dropped: AtomicU64,
}

impl AlertQueue {
    /// Create a queue holding at most `capacity` pending jobs.
    pub fn bounded(capacity: usize) -> (Self, mpsc::Receiver<AlertJob>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let queue = Self {
            tx,
            enqueued: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        };
        (queue, rx)
    }

    pub fn enqueued(&self) -> u64 {
        self.enqueued.load(Ordering::Relaxed)
    }

    /// Jobs dropped because the queue was full or closed.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl MatchSink for AlertQueue {
    fn publish(&self, fact: Arc<KillmailFact>, results: &[MatchResult]) {
        for result in results {
            let job = AlertJob {
                result: result.clone(),
                fact: Arc::clone(&fact),
            };
            match self.tx.try_send(job) {
                Ok(()) => {
                    self.enqueued.fetch_add(1, Ordering::Relaxed);
                }
                Err(TrySendError::Full(job)) => {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        profile_id = job.result.profile_id,
                        killmail_id = job.result.killmail_id,
                        "alert queue full, dropping match"
                    );
                }
                Err(TrySendError::Closed(job)) => {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        profile_id = job.result.profile_id,
                        killmail_id = job.result.killmail_id,
                        "alert queue closed, dropping match"
                    );
                }
            }
        }
    }
}

// ── Workers ─────────────────────────────────────────────────────────

/// Pipeline counters, readable while the pipeline runs.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineCounters {
    pub processed: u64,
    pub recorded: u64,
    pub record_failures: u64,
    pub deliveries: u64,
    pub delivery_failures: u64,
    pub render_failures: u64,
}

#[derive(Default)]
struct Counters {
    processed: AtomicU64,
    recorded: AtomicU64,
    record_failures: AtomicU64,
    deliveries: AtomicU64,
    delivery_failures: AtomicU64,
    render_failures: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

pub struct AlertPipeline {
    recorder: Arc<dyn AlertRecorder>,
    dispatcher: Arc<DispatcherHandle>,
    registry: Option<Arc<RegistryHandle>>,
    renderer: TemplateRenderer,
    templates: MessageTemplates,
    workers: usize,
    counters: Counters,
}

impl AlertPipeline {
    pub fn new(
        recorder: Arc<dyn AlertRecorder>,
        dispatcher: Arc<DispatcherHandle>,
        workers: usize,
    ) -> Self {
        Self {
            recorder,
            dispatcher,
            registry: None,
            renderer: TemplateRenderer::new(),
            templates: MessageTemplates::default(),
            workers: workers.max(1),
            counters: Counters::default(),
        }
    }

    /// Look up profile description and tags for templates.
    pub fn with_registry(mut self, registry: Arc<RegistryHandle>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Render alerts with `templates` instead of the built-in ones.
    pub fn with_templates(mut self, templates: MessageTemplates) -> Self {
        self.templates = templates;
        self
    }

    pub fn counters(&self) -> PipelineCounters {
        let c = &self.counters;
        PipelineCounters {
            processed: c.processed.load(Ordering::Relaxed),
            recorded: c.recorded.load(Ordering::Relaxed),
            record_failures: c.record_failures.load(Ordering::Relaxed),
            deliveries: c.deliveries.load(Ordering::Relaxed),
            delivery_failures: c.delivery_failures.load(Ordering::Relaxed),
            render_failures: c.render_failures.load(Ordering::Relaxed),
        }
    }

    /// Consume jobs until the queue closes or `shutdown` fires.
    ///
    /// On shutdown the queue is closed and jobs already in it are still
    /// processed. Returns once every in-flight job has finished.
    pub async fn run(self: Arc<Self>, mut rx: mpsc::Receiver<AlertJob>, shutdown: Arc<Notify>) {
        let permits = Arc::new(Semaphore::new(self.workers));
        info!(workers = self.workers, "alert pipeline started");

        loop {
            tokio::select! {
                job = rx.recv() => match job {
                    Some(job) => self.spawn_job(&permits, job).await,
                    None => {
                        debug!("alert queue closed");
                        break;
                    }
                },
                _ = shutdown.notified() => {
                    info!("alert pipeline shutting down, draining queue");
                    rx.close();
                    while let Some(job) = rx.recv().await {
                        self.spawn_job(&permits, job).await;
                    }
                    break;
                }
            }
        }

        // Wait for in-flight jobs.
        let _ = permits.acquire_many(self.workers as u32).await;
        let counters = self.counters();
        info!(
            processed = counters.processed,
            recorded = counters.recorded,
            delivery_failures = counters.delivery_failures,
            "alert pipeline stopped"
        );
    }

    async fn spawn_job(self: &Arc<Self>, permits: &Arc<Semaphore>, job: AlertJob) {
        let permit = match Arc::clone(permits).acquire_owned().await {
            Ok(p) => p,
            Err(_) => return,
        };
        let pipeline = Arc::clone(self);
        tokio::spawn(async move {
            pipeline.process(job).await;
            drop(permit);
        });
    }

    /// Record, render and deliver one job.
    ///
    /// Returns `None` when the alert could not be recorded; nothing is
    /// delivered in that case.
    pub async fn process(&self, job: AlertJob) -> Option<(AlertId, Vec<DispatchResult>)> {
        Counters::bump(&self.counters.processed);
        let AlertJob { result, fact } = job;

        let alert_id = match self.recorder.record_match(&result) {
            Ok(id) => {
                Counters::bump(&self.counters.recorded);
                id
            }
            Err(e) => {
                Counters::bump(&self.counters.record_failures);
                error!(
                    profile_id = result.profile_id,
                    killmail_id = result.killmail_id,
                    error = %e,
                    "failed to record alert, skipping delivery"
                );
                return None;
            }
        };

        let ctx = TemplateContext::for_match(&result, &fact, Some(alert_id), self.profile_context(&result));
        let notification = match self.renderer.notification(&self.templates, &ctx) {
            Ok(n) => n,
            Err(e) => {
                Counters::bump(&self.counters.render_failures);
                warn!(alert_id = %alert_id, error = %e, "failed to render notification");
                return Some((alert_id, Vec::new()));
            }
        };

        let dispatcher = self.dispatcher.current();
        let results = dispatcher.dispatch(result.profile_id, &notification).await;
        for r in &results {
            if r.success {
                Counters::bump(&self.counters.deliveries);
            } else {
                Counters::bump(&self.counters.delivery_failures);
            }
        }
        Some((alert_id, results))
    }

    fn profile_context(&self, result: &MatchResult) -> Option<ProfileContext> {
        let snapshot = self.registry.as_ref()?.snapshot();
        let profile = &snapshot.get(result.profile_id)?.profile;
        Some(ProfileContext {
            id: profile.id,
            name: profile.name.clone(),
            description: profile.description.clone(),
            tags: profile.tags.clone(),
        })
    }
}
