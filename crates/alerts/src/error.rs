use killwatch_core::{AlertId, TransitionError};

/// Errors from alert history and lifecycle operations.
#[derive(Debug, thiserror::Error)]
pub enum AlertError {
    #[error("alert not found: {0}")]
    NotFound(AlertId),

    #[error(transparent)]
    InvalidTransition(#[from] TransitionError),

    #[error("alert storage error: {0}")]
    Storage(String),
}

pub type Result<T> = std::result::Result<T, AlertError>;
