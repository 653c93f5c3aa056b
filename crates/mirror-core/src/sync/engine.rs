//! SyncEngine implementation
//!
//! The engine brings every member folder of a group to the same
//! relative-path to file-identity mapping. The full pass is driven by the
//! group's manifest: a path the manifest knows about that is now missing
//! somewhere was deleted, and the deletion propagates; a path the manifest
//! does not know about is new, and it is linked everywhere.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use mirror_fs::{NormalizedPath, create_hardlink, create_symlink, remove_entry};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::inventory::{Entry, EntryKind, FolderInventory, probe};
use super::report::SyncReport;
use crate::group::MirrorGroup;
use crate::manifest::ManifestStore;
use crate::marker::{is_marker_name, marker_path};
use crate::registry::Registry;
use crate::{Error, Result};

/// Engine for reconciling mirror groups
pub struct SyncEngine {
    manifests: ManifestStore,
}

impl SyncEngine {
    pub fn new(manifests: ManifestStore) -> Self {
        Self { manifests }
    }

    /// Engine sharing `registry`'s manifest directory.
    pub fn for_registry(registry: &Registry) -> Self {
        Self::new(registry.manifests().clone())
    }

    /// Link one newly added file or folder symlink into every other member
    /// folder at the same relative path.
    ///
    /// Destinations that already hold the same entry are skipped, as are
    /// destinations holding an unrelated entry of the same name (logged as
    /// a collision). Markers are never propagated. Returns the paths
    /// created.
    ///
    /// # Errors
    ///
    /// Fails if `path` cannot be stat'ed or is neither a regular file nor a
    /// folder symlink. Failures creating individual links are logged and
    /// skipped.
    pub fn sync_file_to_group(&self, path: &Path, group: &MirrorGroup) -> Result<Vec<PathBuf>> {
        let path = NormalizedPath::new(path);
        if !group.is_syncable() || path.as_path().file_name().is_some_and(is_marker_name) {
            return Ok(Vec::new());
        }
        let Some((root, rel)) = locate(&path, group) else {
            return Ok(Vec::new());
        };

        let source = source_entry(path.as_path())?;
        let mut created = Vec::new();
        for folder in group.folders.iter().filter(|f| **f != root) {
            if !folder.is_dir() {
                continue;
            }
            let dest = folder.join(&rel).to_native();
            match probe(&dest) {
                Some(kind) if kind == source.kind => continue,
                _ if fs::symlink_metadata(&dest).is_ok() => {
                    warn!(dest = %dest.display(), "name collision, not linking");
                    continue;
                }
                _ => {}
            }
            match materialize(&source, &dest) {
                Ok(()) => created.push(dest),
                Err(e) => warn!(dest = %dest.display(), error = %e, "failed to link into group"),
            }
        }

        if !created.is_empty() {
            debug!(source = %path, count = created.len(), group = %group.id, "synced file to group");
        }
        Ok(created)
    }

    /// Full reconciliation of `group`.
    ///
    /// Every member folder is inventoried once up front. Deletion detection
    /// runs against that snapshot before any additions, then empty
    /// directories left by deletions are pruned and the manifest is
    /// rewritten. Fewer than two readable folders is a no-op.
    ///
    /// # Errors
    ///
    /// Only a manifest read or write failure aborts the pass. Per-entry
    /// failures are collected in [`SyncReport::errors`].
    pub fn sync_group(&self, group: &MirrorGroup) -> Result<SyncReport> {
        let mut report = SyncReport::default();
        if !group.is_syncable() {
            return Ok(report);
        }

        let folders: Vec<&NormalizedPath> = group
            .folders
            .iter()
            .filter(|f| fs::read_dir(f.as_path()).is_ok())
            .collect();
        if folders.len() < 2 {
            debug!(group = %group.id, "fewer than two readable folders, skipping sync");
            return Ok(report);
        }

        let previous = self.manifests.load(&group.id)?;
        let inventories: Vec<FolderInventory> =
            folders.iter().map(|f| FolderInventory::scan(f)).collect();
        let all_paths: BTreeSet<&str> = inventories
            .iter()
            .flat_map(|inv| inv.entries.keys().map(String::as_str))
            .collect();

        let mut manifest = BTreeSet::new();

        // Deletions first, against the same snapshot.
        for rel in &previous {
            let present: Vec<&Entry> = inventories.iter().filter_map(|inv| inv.get(rel)).collect();
            if present.len() == inventories.len() {
                manifest.insert(rel.clone());
                continue;
            }
            for entry in present {
                match remove_entry(&entry.path) {
                    Ok(()) => report.deleted.push(entry.path.clone()),
                    Err(e) => {
                        warn!(path = %entry.path.display(), error = %e, "failed to propagate deletion");
                        report.errors.push(e.to_string());
                    }
                }
            }
        }

        for rel in all_paths.into_iter().filter(|rel| !previous.contains(*rel)) {
            let Some(source) = inventories.iter().find_map(|inv| inv.get(rel)) else {
                continue;
            };
            for inv in &inventories {
                match inv.get(rel) {
                    Some(entry) if entry.kind != source.kind => {
                        warn!(path = %entry.path.display(), "name collision with unrelated entry");
                        report.collisions.push(entry.path.clone());
                    }
                    Some(_) => {}
                    None => {
                        let dest = inv.root.join(rel).to_native();
                        match materialize(source, &dest) {
                            Ok(()) => {
                                report.created.insert(dest, source.path.clone());
                            }
                            Err(Error::Fs(mirror_fs::Error::AlreadyExists { path })) => {
                                warn!(dest = %path.display(), "name collision, not linking");
                                report.collisions.push(path);
                            }
                            Err(e) => {
                                warn!(dest = %dest.display(), error = %e, "failed to link into group");
                                report.errors.push(e.to_string());
                            }
                        }
                    }
                }
            }
            manifest.insert(rel.to_string());
        }

        if !report.deleted.is_empty() {
            for inv in &inventories {
                prune_empty_dirs(inv.root.as_path());
            }
        }

        self.manifests.save(&group.id, &manifest)?;
        info!(group = %group.id, summary = %report.summary(), "synced group");
        Ok(report)
    }

    /// Delete `path` and every entry sharing its identity at the same
    /// relative path in the other member folders.
    ///
    /// Entries with a different identity are left alone, so an unrelated
    /// file that happens to share the name is never removed.
    pub fn delete_from_group(&self, path: &Path, group: &MirrorGroup) -> Result<Vec<PathBuf>> {
        let path = NormalizedPath::new(path);
        let Some((_, rel)) = locate(&path, group) else {
            return Ok(Vec::new());
        };
        let target = source_entry(path.as_path())?;

        let mut deleted = Vec::new();
        for folder in &group.folders {
            let candidate = folder.join(&rel).to_native();
            if probe(&candidate).as_ref() != Some(&target.kind) {
                continue;
            }
            match remove_entry(&candidate) {
                Ok(()) => deleted.push(candidate),
                Err(e) => warn!(path = %candidate.display(), error = %e, "failed to delete from group"),
            }
        }
        info!(group = %group.id, count = deleted.len(), "deleted from group");
        Ok(deleted)
    }

    /// Mirror the removal of `deleted` (already gone) into the other member
    /// folders, matching by relative path only.
    ///
    /// Directories are never removed.
    pub fn propagate_delete_to_group(
        &self,
        deleted: &Path,
        group: &MirrorGroup,
    ) -> Result<Vec<PathBuf>> {
        let deleted = NormalizedPath::new(deleted);
        if deleted.as_path().file_name().is_some_and(is_marker_name) {
            return Ok(Vec::new());
        }
        let Some((root, rel)) = locate(&deleted, group) else {
            return Ok(Vec::new());
        };

        let mut removed = Vec::new();
        for folder in group.folders.iter().filter(|f| **f != root) {
            let candidate = folder.join(&rel).to_native();
            let Ok(meta) = fs::symlink_metadata(&candidate) else {
                continue;
            };
            if meta.file_type().is_dir() {
                continue;
            }
            match remove_entry(&candidate) {
                Ok(()) => removed.push(candidate),
                Err(e) => warn!(path = %candidate.display(), error = %e, "failed to propagate deletion"),
            }
        }
        if !removed.is_empty() {
            debug!(source = %deleted, count = removed.len(), "propagated deletion");
        }
        Ok(removed)
    }
}

/// The member folder containing `path` and the path relative to it.
/// `None` if `path` is outside the group or is a member folder itself.
fn locate(path: &NormalizedPath, group: &MirrorGroup) -> Option<(NormalizedPath, String)> {
    let root = group.root_for(path)?;
    let rel = path.relative_to(root)?;
    if rel.is_empty() {
        return None;
    }
    Some((root.clone(), rel))
}

fn source_entry(path: &Path) -> Result<Entry> {
    fs::symlink_metadata(path).map_err(|e| mirror_fs::Error::io(path, e))?;
    let kind = probe(path).ok_or_else(|| mirror_fs::Error::NotARegularFile {
        path: path.to_path_buf(),
    })?;
    Ok(Entry {
        path: path.to_path_buf(),
        kind,
    })
}

/// Create `dest` as a hardlink (or symlink copy) of `source`, creating
/// intermediate directories.
fn materialize(source: &Entry, dest: &Path) -> Result<()> {
    let parent = dest
        .parent()
        .ok_or_else(|| Error::invalid(format!("no parent directory for {}", dest.display())))?;
    fs::create_dir_all(parent).map_err(|e| mirror_fs::Error::io(parent, e))?;
    match &source.kind {
        // Same relative path, so the source's own name is the right one.
        EntryKind::File(_) => create_hardlink(&source.path, parent, None)?,
        EntryKind::FolderLink(target) => create_symlink(target, dest)?,
    };
    Ok(())
}

/// Remove empty subdirectories of `root`, deepest first. A directory whose
/// only entry is a marker counts as empty.
fn prune_empty_dirs(root: &Path) {
    let dirs = WalkDir::new(root)
        .min_depth(1)
        .contents_first(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_dir());

    for dir in dirs {
        let Ok(entries) = fs::read_dir(dir.path()) else {
            continue;
        };
        let names: Vec<_> = entries.filter_map(|e| e.ok()).map(|e| e.file_name()).collect();
        if names.iter().any(|n| !is_marker_name(n)) {
            continue;
        }
        if !names.is_empty() {
            let _ = fs::remove_file(marker_path(dir.path()));
        }
        match fs::remove_dir(dir.path()) {
            Ok(()) => debug!(path = %dir.path().display(), "pruned empty directory"),
            Err(e) => debug!(path = %dir.path().display(), error = %e, "could not prune directory"),
        }
    }
}
