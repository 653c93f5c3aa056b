//! Per-folder snapshot of syncable entries

use crate::marker::is_marker_name;
use mirror_fs::{FileIdentity, NormalizedPath, identity, is_folder_symlink, read_symlink_target};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// What a synced entry is, compared across folders
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum EntryKind {
    /// A regular file, matched by identity
    File(FileIdentity),
    /// An opaque folder symlink, matched by its stored target
    FolderLink(PathBuf),
}

#[derive(Debug, Clone)]
pub(crate) struct Entry {
    pub path: PathBuf,
    pub kind: EntryKind,
}

/// Classify the entry at `path` without following it.
///
/// Returns `None` for anything that is not a regular file or folder
/// symlink, and for entries that cannot be stat'ed.
pub(crate) fn probe(path: &Path) -> Option<EntryKind> {
    let file_type = fs::symlink_metadata(path).ok()?.file_type();
    if file_type.is_file() {
        identity(path).ok().map(EntryKind::File)
    } else if file_type.is_symlink() && is_folder_symlink(path) {
        read_symlink_target(path).ok().map(EntryKind::FolderLink)
    } else {
        None
    }
}

/// Relative path to entry, for one member folder.
///
/// Keys are in [`mirror_fs::to_relative_string`] form, which keeps names
/// that are not valid Unicode distinct.
#[derive(Debug)]
pub(crate) struct FolderInventory {
    pub root: NormalizedPath,
    pub entries: BTreeMap<String, Entry>,
}

impl FolderInventory {
    /// Walk `root` recursively. Markers are excluded and folder symlinks
    /// are recorded but never descended into; unreadable entries are
    /// skipped.
    pub fn scan(root: &NormalizedPath) -> Self {
        let mut entries = BTreeMap::new();
        let walk = WalkDir::new(root.as_path())
            .min_depth(1)
            .follow_links(false)
            .into_iter()
            .filter_map(|e| match e {
                Ok(entry) => Some(entry),
                Err(e) => {
                    debug!(error = %e, "skipping unreadable entry");
                    None
                }
            });

        for entry in walk {
            let file_type = entry.file_type();
            if file_type.is_dir() || is_marker_name(entry.file_name()) {
                continue;
            }
            let Some(kind) = probe(entry.path()) else {
                continue;
            };
            let Ok(rel) = entry.path().strip_prefix(root.as_path()) else {
                continue;
            };
            entries.insert(
                mirror_fs::to_relative_string(rel),
                Entry {
                    path: entry.path().to_path_buf(),
                    kind,
                },
            );
        }

        Self {
            root: root.clone(),
            entries,
        }
    }

    pub fn get(&self, rel: &str) -> Option<&Entry> {
        self.entries.get(rel)
    }
}
