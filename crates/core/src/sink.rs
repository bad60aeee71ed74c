//! Collaborator seams between the matching engine and alert handling.

use std::sync::Arc;

use crate::alert::{AlertId, MatchResult};
use crate::error::Result;
use crate::killmail::KillmailFact;

/// Receives match results from the engine.
///
/// Implementations must not block: the engine calls this on its hot path
/// and never learns whether downstream delivery succeeded.
pub trait MatchSink: Send + Sync {
    fn publish(&self, fact: Arc<KillmailFact>, results: &[MatchResult]);
}

/// Persists a match result as a new alert.
pub trait AlertRecorder: Send + Sync {
    fn record_match(&self, result: &MatchResult) -> Result<AlertId>;
}
