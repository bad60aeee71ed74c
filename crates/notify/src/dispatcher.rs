//! Routes notifications to configured channels.
//!
//! The dispatcher receives a notification and delivers it to all
//! channels configured for the matching profile. Individual channel
//! failures don't block other channels.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

use killwatch_core::ProfileId;

use crate::traits::{DispatchResult, Notification, Notifier, NotifyError};

/// Dispatches notifications to multiple channels, organized per profile.
pub struct Dispatcher {
    /// Profile id → list of notifier channels for that profile.
    profile_channels: HashMap<ProfileId, Vec<Box<dyn Notifier>>>,
    /// Fallback channels used when a profile has no channels of its own.
    default_channels: Vec<Box<dyn Notifier>>,
}

impl Dispatcher {
    /// Create a dispatcher with per-profile channels and shared defaults.
    pub fn new(
        profile_channels: HashMap<ProfileId, Vec<Box<dyn Notifier>>>,
        default_channels: Vec<Box<dyn Notifier>>,
    ) -> Self {
        Self {
            profile_channels,
            default_channels,
        }
    }

    /// Create an empty dispatcher.
    pub fn empty() -> Self {
        Self::new(HashMap::new(), Vec::new())
    }

    /// Create a dispatcher with channels shared across all profiles.
    pub fn with_defaults(channels: Vec<Box<dyn Notifier>>) -> Self {
        Self::new(HashMap::new(), channels)
    }

    /// Channels that would receive a notification for `profile_id`.
    fn channels_for(&self, profile_id: ProfileId) -> &[Box<dyn Notifier>] {
        match self.profile_channels.get(&profile_id) {
            Some(channels) if !channels.is_empty() => channels,
            _ => &self.default_channels,
        }
    }

    pub fn channel_count(&self, profile_id: ProfileId) -> usize {
        self.channels_for(profile_id).len()
    }

    /// Dispatch a notification for a profile to all its channels.
    ///
    /// Returns results for each channel delivery. Individual failures
    /// don't block other channels.
    pub async fn dispatch(
        &self,
        profile_id: ProfileId,
        notification: &Notification,
    ) -> Vec<DispatchResult> {
        let channels = self.channels_for(profile_id);

        if channels.is_empty() {
            tracing::debug!(profile_id, "No notification channels configured");
            return Vec::new();
        }

        let mut results = Vec::with_capacity(channels.len());
        for channel in channels {
            let start = Instant::now();
            let result = channel.send(notification).await;
            results.push(record(profile_id, channel.as_ref(), start, result, "Notification"));
        }
        results
    }

    /// Send a test notification through every channel of a profile.
    ///
    /// Errors only when the profile has nowhere to deliver to; per-channel
    /// failures are reported in the results.
    pub async fn test_profile(&self, profile_id: ProfileId) -> Result<Vec<DispatchResult>, NotifyError> {
        let channels = self.channels_for(profile_id);
        if channels.is_empty() {
            return Err(NotifyError::Config(format!(
                "No channels for profile {profile_id}"
            )));
        }

        let mut results = Vec::with_capacity(channels.len());
        for channel in channels {
            let start = Instant::now();
            let result = channel.test().await;
            results.push(record(profile_id, channel.as_ref(), start, result, "Test notification"));
        }
        Ok(results)
    }
}

fn record(
    profile_id: ProfileId,
    channel: &dyn Notifier,
    start: Instant,
    result: Result<(), NotifyError>,
    what: &str,
) -> DispatchResult {
    let duration_ms = start.elapsed().as_millis() as u64;
    let (success, error) = match result {
        Ok(()) => {
            tracing::info!(
                profile_id,
                channel = channel.channel_name(),
                duration_ms,
                "{} delivered",
                what
            );
            (true, None)
        }
        Err(e) => {
            tracing::warn!(
                profile_id,
                channel = channel.channel_name(),
                error = %e,
                duration_ms,
                "{} delivery failed",
                what
            );
            (false, Some(e.to_string()))
        }
    };

    DispatchResult {
        channel: channel.channel_name().to_string(),
        profile_id,
        success,
        error,
        duration_ms,
    }
}

/// Shared pointer to the current [`Dispatcher`], rebuilt on profile reload.
pub struct DispatcherHandle {
    current: RwLock<Arc<Dispatcher>>,
}

impl DispatcherHandle {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            current: RwLock::new(Arc::new(dispatcher)),
        }
    }

    /// The current dispatcher. Hold the returned `Arc` across awaits, not the lock.
    pub fn current(&self) -> Arc<Dispatcher> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn replace(&self, next: Dispatcher) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(next);
    }
}

impl Default for DispatcherHandle {
    fn default() -> Self {
        Self::new(Dispatcher::empty())
    }
}
