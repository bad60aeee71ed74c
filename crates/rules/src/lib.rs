//! Surveillance profile matching.
//!
//! This crate provides:
//! - Criteria trees: wire-form compilation into a closed, typed node tree
//! - A pure AND/OR/NOT evaluator with weighted confidence and deadlines
//! - Profile stores (directory loader with hot-reload via `notify`, in-memory)
//! - An atomically swappable registry of compiled profiles
//! - The matching engine that runs every profile against each killmail

pub mod criteria;
pub mod engine;
pub mod evaluator;
pub mod profile;
pub mod registry;
pub mod store;

pub use criteria::CompiledCriteria;
pub use engine::{EngineStats, MatchingEngine, ReloadSummary};
pub use evaluator::{evaluate, evaluate_with_deadline, Evaluation};
pub use profile::{ChannelKind, CompiledProfile, NotificationChannelConfig, Profile};
pub use registry::{ProfileRegistry, RegistryHandle};
pub use store::{DirectoryProfileStore, MemoryProfileStore, ProfileStore, ProfileStoreError};
