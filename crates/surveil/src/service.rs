//! The operational facade over the matching engine, alert history and
//! notification channels.

use std::sync::Arc;

use tracing::{info, warn};

use killwatch_alerts::{
    bulk_acknowledge, AlertHistory, AlertMetrics, AlertQuery, BulkOutcome, MetricsAggregator,
    ProfileSummary, TimeWindow,
};
use killwatch_core::{Alert, AlertId, KillmailFact, KillwatchConfig, MatchResult, MatchSink, ProfileId};
use killwatch_notify::{build_dispatcher, DispatchResult, DispatcherHandle};
use killwatch_rules::{EngineStats, MatchingEngine, ProfileStore, RegistryHandle, ReloadSummary};

use crate::error::{Result, ServiceError};

/// Everything an operator surface needs: reload, evaluate, stats, alert
/// metrics and lifecycle, and channel tests.
pub struct SurveillanceService {
    store: Arc<dyn ProfileStore>,
    engine: MatchingEngine,
    history: Arc<dyn AlertHistory>,
    dispatcher: Arc<DispatcherHandle>,
    aggregator: MetricsAggregator,
    default_webhook_url: Option<String>,
}

impl SurveillanceService {
    pub fn new(
        store: Arc<dyn ProfileStore>,
        history: Arc<dyn AlertHistory>,
        config: &KillwatchConfig,
    ) -> Self {
        Self {
            engine: MatchingEngine::new(Arc::clone(&store), config.engine.clone()),
            store,
            history,
            dispatcher: Arc::new(DispatcherHandle::default()),
            aggregator: MetricsAggregator::new(config.metrics.clone()),
            default_webhook_url: config.pipeline.default_webhook_url.clone(),
        }
    }

    /// Forward match results to `sink` (normally the alert queue).
    pub fn with_sink(mut self, sink: Arc<dyn MatchSink>) -> Self {
        self.engine = self.engine.with_sink(sink);
        self
    }

    /// Dispatcher shared with the alert pipeline. Replaced on every reload.
    pub fn dispatcher(&self) -> Arc<DispatcherHandle> {
        Arc::clone(&self.dispatcher)
    }

    /// Registry handle shared with the alert pipeline.
    pub fn registry(&self) -> Arc<RegistryHandle> {
        Arc::clone(self.engine.registry())
    }

    /// Reload profiles and rebuild notification channels to match.
    ///
    /// On store failure the previous profiles and channels stay in place.
    pub fn reload(&self) -> Result<ReloadSummary> {
        let summary = self.engine.reload()?;
        let dispatcher = build_dispatcher(&self.engine.snapshot(), self.default_webhook_url.as_deref());
        self.dispatcher.replace(dispatcher);
        Ok(summary)
    }

    pub fn evaluate(&self, fact: &KillmailFact) -> Vec<MatchResult> {
        self.engine.evaluate(fact)
    }

    pub fn get_stats(&self) -> EngineStats {
        self.engine.get_stats()
    }

    /// System-wide alert metrics. `None` uses the configured default window.
    ///
    /// Covers every stored profile, disabled ones included. When the store
    /// is unreachable the live registry is used instead.
    pub fn get_alert_metrics(&self, window: Option<TimeWindow>) -> Result<AlertMetrics> {
        let window = window.unwrap_or_else(|| self.aggregator.default_window());
        let profiles: Vec<ProfileSummary> = match self.store.list_profiles() {
            Ok(profiles) => profiles.iter().map(ProfileSummary::from).collect(),
            Err(e) => {
                warn!(error = %e, "profile store unavailable, metrics limited to loaded profiles");
                self.engine
                    .snapshot()
                    .profiles()
                    .iter()
                    .map(|p| ProfileSummary::from(&p.profile))
                    .collect()
            }
        };
        let avg_response_ms = self.engine.get_stats().avg_eval_ms();
        Ok(self
            .aggregator
            .alert_metrics(&profiles, self.history.as_ref(), &window, avg_response_ms)?)
    }

    pub fn get_recent_alerts(&self, query: &AlertQuery) -> Result<Vec<Alert>> {
        Ok(self.history.query_alerts(query)?)
    }

    /// Send a test notification through every channel of a loaded profile.
    pub async fn test_notification_delivery(&self, profile_id: ProfileId) -> Result<Vec<DispatchResult>> {
        if self.engine.snapshot().get(profile_id).is_none() {
            return Err(ServiceError::UnknownProfile(profile_id));
        }
        let dispatcher = self.dispatcher.current();
        let results = dispatcher.test_profile(profile_id).await?;
        info!(
            profile_id,
            channels = results.len(),
            failed = results.iter().filter(|r| !r.success).count(),
            "notification test finished"
        );
        Ok(results)
    }

    pub fn bulk_acknowledge(&self, filter: &AlertQuery, actor: &str) -> Result<BulkOutcome> {
        Ok(bulk_acknowledge(self.history.as_ref(), filter, actor)?)
    }

    pub fn acknowledge(&self, id: AlertId, actor: &str) -> Result<Alert> {
        Ok(self.history.acknowledge(id, actor)?)
    }

    pub fn resolve(&self, id: AlertId, actor: &str) -> Result<Alert> {
        Ok(self.history.resolve(id, actor)?)
    }
}
