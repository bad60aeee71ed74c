//! Filesystem event filtering for the profiles watcher.

use std::path::Path;

use notify::event::{CreateKind, ModifyKind, RemoveKind};
use notify::{Event, EventKind};

const PROFILE_EXTENSIONS: &[&str] = &["yml", "yaml", "json"];

/// Whether `path` looks like a profile document (extension only).
pub(super) fn is_profile_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| PROFILE_EXTENSIONS.contains(&e))
        .unwrap_or(false)
}

/// Whether a watcher event should trigger a registry reload.
///
/// Only create/modify/rename/remove of non-hidden profile documents count.
/// Editors' temporary dotfiles are ignored.
pub(super) fn is_relevant_event(event: &Event) -> bool {
    let kind_matters = matches!(
        event.kind,
        EventKind::Create(CreateKind::File)
            | EventKind::Create(CreateKind::Any)
            | EventKind::Modify(ModifyKind::Data(_))
            | EventKind::Modify(ModifyKind::Name(_))
            | EventKind::Modify(ModifyKind::Any)
            | EventKind::Remove(RemoveKind::File)
            | EventKind::Remove(RemoveKind::Any)
    );
    if !kind_matters {
        return false;
    }

    event.paths.iter().any(|path| {
        let hidden = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with('.'))
            .unwrap_or(true);
        !hidden && is_profile_path(path)
    })
}
