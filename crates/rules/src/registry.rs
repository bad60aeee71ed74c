//! Immutable profile snapshots and the handle that swaps them.

use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};

use killwatch_core::ProfileId;

use crate::profile::{CompiledProfile, Profile};

/// One consistent, immutable set of compiled profiles.
#[derive(Debug, Clone)]
pub struct ProfileRegistry {
    profiles: Vec<Arc<CompiledProfile>>,
    loaded_at: DateTime<Utc>,
    generation: u64,
}

impl ProfileRegistry {
    /// An empty registry, used before the first reload.
    pub fn empty() -> Self {
        Self {
            profiles: Vec::new(),
            loaded_at: Utc::now(),
            generation: 0,
        }
    }

    /// Compile `profiles` into a new registry. Disabled profiles are dropped.
    pub fn build(profiles: Vec<Profile>, generation: u64) -> Self {
        let profiles = profiles
            .into_iter()
            .filter(|p| p.enabled)
            .map(|p| Arc::new(CompiledProfile::compile(p)))
            .collect();
        Self {
            profiles,
            loaded_at: Utc::now(),
            generation,
        }
    }

    pub fn profiles(&self) -> &[Arc<CompiledProfile>] {
        &self.profiles
    }

    pub fn get(&self, id: ProfileId) -> Option<&Arc<CompiledProfile>> {
        self.profiles.iter().find(|p| p.id() == id)
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    /// Monotonic reload counter; 0 for the initial empty registry.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Shared pointer to the current [`ProfileRegistry`].
///
/// Readers clone the inner `Arc` and release the lock immediately, so an
/// in-flight evaluation keeps its snapshot while a reload swaps in the next.
#[derive(Debug)]
pub struct RegistryHandle {
    current: RwLock<Arc<ProfileRegistry>>,
}

impl Default for RegistryHandle {
    fn default() -> Self {
        Self::new(ProfileRegistry::empty())
    }
}

impl RegistryHandle {
    pub fn new(registry: ProfileRegistry) -> Self {
        Self {
            current: RwLock::new(Arc::new(registry)),
        }
    }

    pub fn snapshot(&self) -> Arc<ProfileRegistry> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Replace the current registry, returning the previous one.
    pub fn swap(&self, next: ProfileRegistry) -> Arc<ProfileRegistry> {
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *guard, Arc::new(next))
    }
}
