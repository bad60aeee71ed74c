//! Error types and per-file scan results for profile stores.

use std::path::PathBuf;

use killwatch_core::ProfileId;

/// Errors that can occur while reading profiles.
#[derive(Debug, thiserror::Error)]
pub enum ProfileStoreError {
    /// Filesystem I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parse/deserialization error.
    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON parse/deserialization error.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// Profile document is structurally valid but unusable (e.g. empty name).
    #[error("Validation error: {0}")]
    Validation(String),

    /// Filesystem watcher error.
    #[error("Notify watcher error: {0}")]
    Notify(#[from] notify::Error),

    /// The backing store cannot be read at all right now.
    #[error("profile store unavailable: {0}")]
    Unavailable(String),
}

/// Result alias for profile store operations.
pub type Result<T> = std::result::Result<T, ProfileStoreError>;

/// Outcome of loading a single profile file.
#[derive(Debug)]
pub struct LoadResult {
    pub path: PathBuf,
    pub status: LoadStatus,
}

/// Status of a single file load attempt.
#[derive(Debug)]
pub enum LoadStatus {
    Loaded { profile_id: ProfileId },
    /// Dotfile, foreign extension, or a duplicate id.
    Skipped { reason: String },
    Failed { error: String },
}
