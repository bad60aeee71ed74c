use thiserror::Error;

#[derive(Error, Debug)]
pub enum KillwatchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(String),

    #[error("Alert storage error: {0}")]
    Storage(String),
}

impl From<serde_json::Error> for KillwatchError {
    fn from(e: serde_json::Error) -> Self {
        KillwatchError::Serialize(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, KillwatchError>;
