//! Alert delivery for surveillance matches.
//!
//! This crate provides:
//! - `Notifier` trait for pluggable notification channels
//! - Webhook (structured JSON alert payload) and log notifier implementations
//! - Minijinja template rendering for notification messages
//! - Dispatcher that routes notifications to each profile's channels
//! - The alert pipeline: bounded queue from the engine to a worker pool that
//!   records alerts and delivers notifications

pub mod channels;
pub mod dispatcher;
pub mod logging;
pub mod pipeline;
pub mod templating;
pub mod traits;
pub mod webhook;

pub use channels::build_dispatcher;
pub use dispatcher::{Dispatcher, DispatcherHandle};
pub use pipeline::{AlertJob, AlertPipeline, AlertQueue, PipelineCounters};
pub use templating::{MessageTemplates, TemplateRenderer};
pub use traits::{DispatchResult, Notification, Notifier, NotifyError};
pub use webhook::{WebhookNotifier, WebhookPayload};
