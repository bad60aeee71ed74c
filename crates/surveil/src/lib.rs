//! Killmail surveillance service.
//!
//! Wires the matching engine, alert history, notification dispatcher and
//! metrics aggregator behind [`SurveillanceService`]. The `surveil-worker`
//! binary runs it over a stream of killmail facts.

pub mod error;
pub mod service;

pub use error::{Result, ServiceError};
pub use service::SurveillanceService;
