//! surveil-worker: runs killmail surveillance over a JSON-lines stream.
//!
//! Reads one killmail fact per line from a file or stdin, evaluates it
//! against every enabled profile, and hands matches to the alert pipeline
//! for recording and notification. Profile documents are reloaded when the
//! profiles directory changes, and alert metrics with recommendations are
//! logged periodically.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, Notify};
use tracing::{debug, error, info, warn};

use killwatch_alerts::InMemoryAlertStore;
use killwatch_core::config::load_dotenv;
use killwatch_core::{KillmailFact, KillwatchConfig};
use killwatch_notify::{AlertPipeline, AlertQueue, MessageTemplates};
use killwatch_rules::DirectoryProfileStore;
use killwatch_surveil::SurveillanceService;

// ── CLI ─────────────────────────────────────────────────────────────

/// Killmail surveillance worker.
#[derive(Parser, Debug)]
#[command(name = "surveil-worker", version, about)]
struct Cli {
    /// JSON-lines file of killmail facts ("-" reads stdin).
    #[arg(long, env = "KILLWATCH_INPUT", default_value = "-")]
    input: String,

    /// Profiles directory (overrides PROFILES_DIR).
    #[arg(long)]
    profiles_dir: Option<PathBuf>,

    /// Do not reload profiles when the directory changes.
    #[arg(long)]
    no_watch: bool,

    /// Seconds between metrics reports (0 disables).
    #[arg(long, env = "KILLWATCH_METRICS_INTERVAL", default_value_t = 60)]
    metrics_interval: u64,

    /// Alerts kept in memory before the oldest are evicted.
    #[arg(long, env = "KILLWATCH_MAX_ALERTS", default_value_t = 100_000)]
    max_alerts: usize,
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    load_dotenv();
    let mut config = KillwatchConfig::from_env();
    if let Some(dir) = cli.profiles_dir.clone() {
        config.engine.profiles_dir = dir;
    }
    if cli.no_watch {
        config.engine.watch_profiles = false;
    }
    config.log_summary();

    let templates = MessageTemplates::from_config(
        config.pipeline.subject_template.as_deref(),
        config.pipeline.body_template.as_deref(),
    )
    .context("invalid alert message template")?;

    // Profile store, with an optional watcher that only signals reloads.
    let (reload_tx, reload_rx) = mpsc::channel::<()>(1);
    let mut profile_store = DirectoryProfileStore::new(config.engine.profiles_dir.clone());
    if config.engine.watch_profiles {
        profile_store
            .watch(move || {
                let _ = reload_tx.try_send(());
            })
            .context("failed to watch profiles directory")?;
    }

    let alerts = Arc::new(InMemoryAlertStore::with_max_alerts(cli.max_alerts));
    let (queue, queue_rx) = AlertQueue::bounded(config.pipeline.queue_capacity);
    let queue = Arc::new(queue);

    let service = Arc::new(
        SurveillanceService::new(Arc::new(profile_store), alerts.clone(), &config)
            .with_sink(queue.clone()),
    );
    let summary = service.reload().context("initial profile load failed")?;
    info!(
        profiles = summary.profiles_loaded,
        unmatchable = summary.unmatchable,
        "surveillance ready"
    );

    let pipeline = Arc::new(
        AlertPipeline::new(alerts.clone(), service.dispatcher(), config.pipeline.workers)
            .with_registry(service.registry())
            .with_templates(templates),
    );
    let shutdown = Arc::new(Notify::new());
    let pipeline_task = tokio::spawn(pipeline.clone().run(queue_rx, shutdown.clone()));

    let reload_task = tokio::spawn(reload_loop(service.clone(), reload_rx));
    let metrics_task = (cli.metrics_interval > 0).then(|| {
        tokio::spawn(metrics_loop(
            service.clone(),
            Duration::from_secs(cli.metrics_interval),
        ))
    });

    let reader: Box<dyn AsyncBufRead + Unpin + Send> = if cli.input == "-" {
        Box::new(BufReader::new(tokio::io::stdin()))
    } else {
        let file = tokio::fs::File::open(&cli.input)
            .await
            .with_context(|| format!("failed to open {}", cli.input))?;
        Box::new(BufReader::new(file))
    };

    tokio::select! {
        result = consume(service.clone(), reader) => {
            if let Err(e) = result {
                error!(error = %e, "input stream failed");
            }
            info!("input exhausted");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("interrupt received, shutting down");
        }
    }

    reload_task.abort();
    if let Some(task) = metrics_task {
        task.abort();
    }
    shutdown.notify_one();
    if let Err(e) = pipeline_task.await {
        error!(error = %e, "alert pipeline task failed");
    }

    let stats = service.get_stats();
    let counters = pipeline.counters();
    info!(
        killmails = stats.killmails_processed,
        matches = stats.matches_processed,
        avg_eval_ms = stats.avg_eval_ms(),
        alerts_recorded = counters.recorded,
        deliveries = counters.deliveries,
        queue_dropped = queue.dropped(),
        "surveil-worker stopped"
    );
    report_metrics(&service);
    Ok(())
}

// ── Tasks ───────────────────────────────────────────────────────────

/// Evaluate every parseable line. Bad lines are logged and skipped.
async fn consume(
    service: Arc<SurveillanceService>,
    reader: Box<dyn AsyncBufRead + Unpin + Send>,
) -> anyhow::Result<()> {
    let mut lines = reader.lines();
    let mut line_no = 0u64;
    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let fact: KillmailFact = match serde_json::from_str(line) {
            Ok(f) => f,
            Err(e) => {
                warn!(line = line_no, error = %e, "skipping malformed killmail");
                continue;
            }
        };

        let svc = service.clone();
        let matches = tokio::task::spawn_blocking(move || svc.evaluate(&fact)).await?;
        if !matches.is_empty() {
            debug!(
                line = line_no,
                profiles = ?matches.iter().map(|m| m.profile_id).collect::<Vec<_>>(),
                "killmail matched"
            );
        }
    }
    Ok(())
}

/// Reload profiles whenever the watcher signals. Bursts of filesystem
/// events collapse into one reload.
async fn reload_loop(service: Arc<SurveillanceService>, mut rx: mpsc::Receiver<()>) {
    while rx.recv().await.is_some() {
        tokio::time::sleep(Duration::from_millis(250)).await;
        while rx.try_recv().is_ok() {}

        let svc = service.clone();
        match tokio::task::spawn_blocking(move || svc.reload()).await {
            Ok(Ok(summary)) => info!(
                generation = summary.generation,
                profiles = summary.profiles_loaded,
                "profiles reloaded after change"
            ),
            Ok(Err(e)) => warn!(error = %e, "profile reload failed, keeping previous profiles"),
            Err(e) => error!(error = %e, "profile reload task failed"),
        }
    }
}

async fn metrics_loop(service: Arc<SurveillanceService>, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    // First tick fires immediately.
    ticker.tick().await;
    loop {
        ticker.tick().await;
        report_metrics(&service);
    }
}

fn report_metrics(service: &SurveillanceService) {
    let metrics = match service.get_alert_metrics(None) {
        Ok(m) => m,
        Err(e) => {
            warn!(error = %e, "failed to compute alert metrics");
            return;
        }
    };
    info!(
        total_alerts = metrics.total_alerts,
        new = metrics.by_state.new,
        acknowledged = metrics.by_state.acknowledged,
        profiles_triggered = metrics.profiles_triggered,
        alerts_per_hour = metrics.alerts_per_hour,
        avg_confidence = metrics.avg_confidence,
        "alert metrics"
    );
    for rec in &metrics.recommendations {
        warn!(
            kind = ?rec.kind,
            priority = %rec.priority,
            profiles = ?rec.profile_ids,
            action = %rec.action,
            "{}",
            rec.description
        );
    }
}
