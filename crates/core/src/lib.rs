pub mod alert;
pub mod config;
pub mod error;
pub mod killmail;
pub mod sink;

pub use alert::*;
pub use config::KillwatchConfig;
pub use error::*;
pub use killmail::*;
pub use sink::{AlertRecorder, MatchSink};
