//! Alert history, lifecycle and profile performance metrics.
//!
//! This crate provides:
//! - An in-memory alert store that records matches and answers queries
//! - Lifecycle transitions (`new → acknowledged → resolved`) and bulk acknowledge
//! - The metrics aggregator: per-profile and system-wide statistics over a
//!   time window, plus optimization recommendations

pub mod aggregator;
pub mod error;
pub mod lifecycle;
pub mod metrics;
pub mod recommendations;
pub mod store;

pub use aggregator::{AlertMetrics, MetricsAggregator, PriorityCounts, StateCounts};
pub use error::{AlertError, Result};
pub use lifecycle::{bulk_acknowledge, bulk_resolve, BulkOutcome};
pub use metrics::{ProfileMetrics, ProfileSummary, TimeWindow};
pub use recommendations::{Recommendation, RecommendationKind};
pub use store::{AlertHistory, AlertQuery, InMemoryAlertStore};
