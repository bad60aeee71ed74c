//! Profile stores: where the engine reads profiles from.
//!
//! The engine only ever reads. [`DirectoryProfileStore`] serves profile
//! documents from disk (with optional hot-reload via a `notify` watcher) and
//! [`MemoryProfileStore`] keeps them in memory for tests and embedding.

mod directory;
mod error;
mod memory;
mod watcher;


pub use self::directory::DirectoryProfileStore;
pub use self::error::{LoadResult, LoadStatus, ProfileStoreError, Result};
pub use self::memory::MemoryProfileStore;

use crate::profile::Profile;

/// Read-only view of the profiles the engine should know about.
pub trait ProfileStore: Send + Sync {
    /// Every profile, enabled or not.
    fn list_profiles(&self) -> Result<Vec<Profile>>;

    /// Profiles the engine should evaluate.
    fn list_enabled_profiles(&self) -> Result<Vec<Profile>> {
        Ok(self
            .list_profiles()?
            .into_iter()
            .filter(|p| p.enabled)
            .collect())
    }
}
