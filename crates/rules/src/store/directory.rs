//! [`DirectoryProfileStore`]: profile documents on disk with optional hot-reload.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, info, warn};

use crate::profile::Profile;

use super::error::{LoadResult, LoadStatus, ProfileStoreError, Result};
use super::watcher::{is_profile_path, is_relevant_event};
use super::ProfileStore;

/// Filesystem-backed profile store.
///
/// Scans a directory (recursively) for `*.yml`, `*.yaml` and `*.json` profile
/// documents. Every read rescans the directory, so the store itself holds no
/// profile state; the registry snapshot is the only cache.
pub struct DirectoryProfileStore {
    profiles_dir: PathBuf,
    /// Active filesystem watcher (held to keep it alive).
    _watcher: Option<RecommendedWatcher>,
}

impl DirectoryProfileStore {
    /// Create a store for the given directory, creating it if missing.
    pub fn new(profiles_dir: PathBuf) -> Self {
        if !profiles_dir.exists() {
            if let Err(e) = fs::create_dir_all(&profiles_dir) {
                warn!(path = %profiles_dir.display(), error = %e, "failed to create profiles directory");
            }
        }
        Self {
            profiles_dir,
            _watcher: None,
        }
    }

    pub fn profiles_dir(&self) -> &Path {
        &self.profiles_dir
    }

    /// Scan the directory and return every profile plus a per-file report.
    ///
    /// Files are visited in path order. When two files carry the same id the
    /// first one wins and the other is reported as skipped. Parse errors are
    /// reported per file and do not abort the scan; failing to read the root
    /// directory does.
    pub fn scan(&self) -> Result<(Vec<Profile>, Vec<LoadResult>)> {
        let mut files = Vec::new();
        collect_files(&self.profiles_dir, &mut files, true)?;
        files.sort();

        let mut profiles = Vec::new();
        let mut results = Vec::new();
        let mut seen = HashSet::new();

        for path in files {
            if let Some(reason) = skip_reason(&path) {
                results.push(LoadResult {
                    path,
                    status: LoadStatus::Skipped { reason },
                });
                continue;
            }

            match load_file(&path) {
                Ok(profile) => {
                    if !seen.insert(profile.id) {
                        warn!(profile_id = profile.id, path = %path.display(), "duplicate profile id, keeping first");
                        results.push(LoadResult {
                            path,
                            status: LoadStatus::Skipped {
                                reason: format!("duplicate profile id {}", profile.id),
                            },
                        });
                        continue;
                    }
                    debug!(profile_id = profile.id, name = %profile.name, path = %path.display(), "loaded profile");
                    results.push(LoadResult {
                        path,
                        status: LoadStatus::Loaded {
                            profile_id: profile.id,
                        },
                    });
                    profiles.push(profile);
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to load profile file");
                    results.push(LoadResult {
                        path,
                        status: LoadStatus::Failed {
                            error: e.to_string(),
                        },
                    });
                }
            }
        }

        Ok((profiles, results))
    }

    /// Start a filesystem watcher that calls `on_change` whenever a profile
    /// document is created, modified, renamed or removed.
    ///
    /// The callback runs on the watcher's thread and should only signal a
    /// reload, not perform it.
    pub fn watch<F>(&mut self, on_change: F) -> Result<()>
    where
        F: Fn() + Send + 'static,
    {
        let mut watcher = notify::recommended_watcher(
            move |res: std::result::Result<notify::Event, notify::Error>| match res {
                Ok(event) if is_relevant_event(&event) => {
                    debug!(paths = ?event.paths, kind = ?event.kind, "profile change detected");
                    on_change();
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "filesystem watcher error"),
            },
        )?;

        watcher.watch(&self.profiles_dir, RecursiveMode::Recursive)?;
        let _ = watcher.configure(notify::Config::default().with_poll_interval(Duration::from_millis(500)));

        info!(path = %self.profiles_dir.display(), "watching profiles directory for changes (recursive)");
        self._watcher = Some(watcher);
        Ok(())
    }
}

impl ProfileStore for DirectoryProfileStore {
    fn list_profiles(&self) -> Result<Vec<Profile>> {
        self.scan().map(|(profiles, _)| profiles)
    }
}

/// Parse a single profile document. The format follows the extension.
pub fn load_file(path: &Path) -> Result<Profile> {
    let contents = fs::read_to_string(path)?;
    let profile: Profile = match path.extension().and_then(|e| e.to_str()) {
        Some("json") => serde_json::from_str(&contents)?,
        _ => serde_yaml::from_str(&contents)?,
    };

    if profile.name.trim().is_empty() {
        return Err(ProfileStoreError::Validation(format!(
            "profile {} has an empty name",
            profile.id
        )));
    }
    Ok(profile)
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>, root: bool) -> Result<()> {
    let entries = match fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) if root => return Err(e.into()),
        Err(e) => {
            warn!(path = %dir.display(), error = %e, "failed to read directory");
            return Ok(());
        }
    };

    for entry in entries {
        let path = entry?.path();

        // Skip dotdirs entirely; dotfiles are reported by the caller.
        let hidden = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with('.'))
            .unwrap_or(false);

        if path.is_dir() {
            if !hidden {
                collect_files(&path, out, false)?;
            }
            continue;
        }
        out.push(path);
    }
    Ok(())
}

fn skip_reason(path: &Path) -> Option<String> {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    if name.starts_with('.') {
        return Some("dotfile".to_string());
    }
    if !is_profile_path(path) {
        return Some("not a profile document".to_string());
    }
    None
}
