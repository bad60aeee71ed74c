use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use killwatch_core::ProfileId;

use crate::profile::Profile;

use super::error::{ProfileStoreError, Result};
use super::ProfileStore;

/// In-memory profile store. Lists profiles in id order.
#[derive(Default)]
pub struct MemoryProfileStore {
    profiles: RwLock<BTreeMap<ProfileId, Profile>>,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_profiles(profiles: impl IntoIterator<Item = Profile>) -> Self {
        let store = Self::new();
        for p in profiles {
            store.upsert(p);
        }
        store
    }

    /// Insert or replace a profile, returning the previous version.
    pub fn upsert(&self, profile: Profile) -> Option<Profile> {
        self.profiles
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(profile.id, profile)
    }

    pub fn set_enabled(&self, id: ProfileId, enabled: bool) -> Result<()> {
        let mut guard = self.profiles.write().unwrap_or_else(PoisonError::into_inner);
        match guard.get_mut(&id) {
            Some(p) => {
                p.enabled = enabled;
                Ok(())
            }
            None => Err(ProfileStoreError::Validation(format!("no profile with id {}", id))),
        }
    }

    pub fn remove(&self, id: ProfileId) -> Option<Profile> {
        self.profiles
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
    }

    pub fn get(&self, id: ProfileId) -> Option<Profile> {
        self.profiles
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }
}

impl ProfileStore for MemoryProfileStore {
    fn list_profiles(&self) -> Result<Vec<Profile>> {
        Ok(self
            .profiles
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect())
    }
}
