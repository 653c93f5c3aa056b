//! Persistent mirror group registry
//!
//! The registry owns the group table and its JSON file. Every mutation is
//! applied to a copy of the table, saved, and only then committed, all
//! under one mutex: the watcher thread reads the table concurrently with
//! foreground edits.

use crate::config::{Config, MANIFEST_DIR_NAME};
use crate::group::MirrorGroup;
use crate::manifest::ManifestStore;
use crate::marker::{remove_marker, write_marker};
use crate::{Error, Result};
use mirror_fs::NormalizedPath;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

const REGISTRY_VERSION: u32 = 1;

#[derive(Deserialize)]
struct RegistryDocument {
    #[serde(default)]
    groups: Vec<serde_json::Value>,
}

#[derive(Serialize)]
struct RegistryDocumentRef<'a> {
    version: u32,
    groups: &'a [MirrorGroup],
}

/// Partial update applied by [`Registry::update_group`]
#[derive(Debug, Clone, Default)]
pub struct GroupUpdate {
    pub name: Option<String>,
    pub folders: Option<Vec<PathBuf>>,
    pub auto_sync: Option<bool>,
}

/// The catalog of mirror groups
#[derive(Debug)]
pub struct Registry {
    path: PathBuf,
    manifests: ManifestStore,
    groups: Mutex<Vec<MirrorGroup>>,
}

impl Registry {
    /// Open the registry stored at `path`.
    ///
    /// A missing or malformed file yields an empty registry; malformed
    /// content is logged, never surfaced. Manifests are kept in a
    /// `manifests/` directory next to the file.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = NormalizedPath::new(path.into()).to_native();
        let manifest_dir = path
            .parent()
            .map(|p| p.join(MANIFEST_DIR_NAME))
            .unwrap_or_else(|| PathBuf::from(MANIFEST_DIR_NAME));
        let groups = load_groups(&path);
        Self {
            path,
            manifests: ManifestStore::new(manifest_dir),
            groups: Mutex::new(groups),
        }
    }

    /// Open the registry at the location named by `config`.
    pub fn open_with_config(config: &Config) -> Result<Self> {
        Ok(Self::open(config.registry_path()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn manifests(&self) -> &ManifestStore {
        &self.manifests
    }

    /// Re-read the registry file, discarding the in-memory table.
    pub fn reload(&self) {
        *self.lock() = load_groups(&self.path);
    }

    // -- CRUD --

    /// Create and persist a new group.
    ///
    /// Fewer than two folders is accepted (the group can be completed
    /// later) but such a group is never synced.
    pub fn create_group<P: AsRef<Path>>(
        &self,
        folders: impl IntoIterator<Item = P>,
        name: Option<&str>,
        auto_sync: bool,
    ) -> Result<MirrorGroup> {
        self.insert_group(MirrorGroup::new(folders, name, auto_sync))
    }

    /// Persist a fully built group and write its folder markers.
    pub fn insert_group(&self, group: MirrorGroup) -> Result<MirrorGroup> {
        if !group.is_syncable() {
            warn!(id = %group.id, folders = group.folders.len(), "group has fewer than two folders");
        }
        let stored = group.clone();
        self.mutate(move |groups| {
            if groups.iter().any(|g| g.id == group.id) {
                return Err(Error::GroupExists { id: group.id });
            }
            groups.push(group);
            Ok(())
        })?;
        for folder in &stored.folders {
            write_marker(folder.as_path(), &stored.id);
        }
        info!(id = %stored.id, name = %stored.name, "created mirror group");
        Ok(stored)
    }

    pub fn get_group(&self, id: &str) -> Option<MirrorGroup> {
        self.lock().iter().find(|g| g.id == id).cloned()
    }

    pub fn list_groups(&self) -> Vec<MirrorGroup> {
        self.lock().clone()
    }

    /// Apply `update` to group `id` and persist.
    ///
    /// Changing the folders re-derives the name unless the same update also
    /// supplies one. Folders that join get a marker, folders that leave
    /// lose theirs.
    pub fn update_group(&self, id: &str, update: GroupUpdate) -> Result<MirrorGroup> {
        let (before, after) = self.mutate(|groups| {
            let group = find_mut(groups, id)?;
            let before = group.folders.clone();
            if let Some(folders) = update.folders {
                group.set_folders(folders);
            }
            if let Some(name) = update.name {
                group.name = name;
            }
            if let Some(auto_sync) = update.auto_sync {
                group.auto_sync = auto_sync;
            }
            group.touch();
            Ok((before, group.clone()))
        })?;

        for removed in before.iter().filter(|f| !after.contains_folder(f)) {
            remove_marker(removed.as_path());
        }
        for added in after.folders.iter().filter(|f| !before.contains(f)) {
            write_marker(added.as_path(), &after.id);
        }
        debug!(id, "updated mirror group");
        Ok(after)
    }

    /// Delete group `id`, its markers and its manifest. Member file
    /// contents are never touched. Returns false if no such group existed.
    pub fn delete_group(&self, id: &str) -> Result<bool> {
        let removed = self.mutate(|groups| {
            Ok(groups
                .iter()
                .position(|g| g.id == id)
                .map(|pos| groups.remove(pos)))
        })?;
        let Some(group) = removed else {
            return Ok(false);
        };
        for folder in &group.folders {
            remove_marker(folder.as_path());
        }
        self.manifests.remove(&group.id);
        info!(id, name = %group.name, "deleted mirror group");
        Ok(true)
    }

    /// Drop every group and its markers. Returns how many were removed.
    pub fn clear_all_groups(&self) -> Result<usize> {
        let removed = self.mutate(|groups| Ok(std::mem::take(groups)))?;
        for group in &removed {
            for folder in &group.folders {
                remove_marker(folder.as_path());
            }
            self.manifests.remove(&group.id);
        }
        info!(count = removed.len(), "cleared all mirror groups");
        Ok(removed.len())
    }

    /// Add `folder` to group `id`. Adding a folder that is already a member
    /// changes nothing.
    pub fn add_folder(&self, id: &str, folder: impl AsRef<Path>) -> Result<MirrorGroup> {
        let folder = NormalizedPath::new(folder);
        if let Some(group) = self.get_group(id)
            && group.contains_folder(&folder)
        {
            return Ok(group);
        }
        let group = self.mutate(|groups| {
            let group = find_mut(groups, id)?;
            let mut folders = group.folders.clone();
            folders.push(folder.clone());
            group.set_folders(folders);
            Ok(group.clone())
        })?;
        write_marker(folder.as_path(), id);
        Ok(group)
    }

    /// Remove `folder` from group `id`. Returns false if it was not a member.
    pub fn remove_folder(&self, id: &str, folder: impl AsRef<Path>) -> Result<bool> {
        let folder = NormalizedPath::new(folder);
        let removed = self.mutate(|groups| {
            let group = find_mut(groups, id)?;
            if !group.contains_folder(&folder) {
                return Ok(false);
            }
            let remaining: Vec<NormalizedPath> = group
                .folders
                .iter()
                .filter(|f| **f != folder)
                .cloned()
                .collect();
            group.set_folders(remaining);
            Ok(true)
        })?;
        if removed {
            remove_marker(folder.as_path());
        }
        Ok(removed)
    }

    // -- Queries --

    /// The group that has `folder` as a member folder.
    pub fn find_group_for_folder(&self, folder: impl AsRef<Path>) -> Option<MirrorGroup> {
        let folder = NormalizedPath::new(folder);
        self.lock()
            .iter()
            .find(|g| g.contains_folder(&folder))
            .cloned()
    }

    /// The group containing `path` (a member folder or anything beneath
    /// one), together with the member folder that matched.
    pub fn find_group_for_path(
        &self,
        path: impl AsRef<Path>,
    ) -> Option<(MirrorGroup, NormalizedPath)> {
        let path = NormalizedPath::new(path);
        self.lock().iter().find_map(|g| {
            g.root_for(&path)
                .map(|root| (g.clone(), root.clone()))
        })
    }

    pub fn is_folder_in_group(&self, folder: impl AsRef<Path>) -> bool {
        self.find_group_for_folder(folder).is_some()
    }

    /// True if some registered group has exactly this folder set.
    pub fn has_folder_set(&self, folders: &[NormalizedPath]) -> bool {
        let wanted: BTreeSet<&NormalizedPath> = folders.iter().collect();
        self.lock()
            .iter()
            .any(|g| g.folders.iter().collect::<BTreeSet<_>>() == wanted)
    }

    // -- Persistence --

    fn lock(&self) -> MutexGuard<'_, Vec<MirrorGroup>> {
        // Mutations only commit after a successful save, so the table is
        // consistent even if a holder panicked.
        self.groups.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn mutate<T>(&self, f: impl FnOnce(&mut Vec<MirrorGroup>) -> Result<T>) -> Result<T> {
        let mut guard = self.lock();
        let mut draft = guard.clone();
        let out = f(&mut draft)?;
        self.save(&draft)?;
        *guard = draft;
        Ok(out)
    }

    fn save(&self, groups: &[MirrorGroup]) -> Result<()> {
        let document = RegistryDocumentRef {
            version: REGISTRY_VERSION,
            groups,
        };
        let content = serde_json::to_string_pretty(&document)
            .map_err(|e| Error::persistence(&self.path, e))?;
        mirror_fs::io::write_text(&self.path, &content)
            .map_err(|e| Error::persistence(&self.path, e))
    }
}

fn find_mut<'a>(groups: &'a mut [MirrorGroup], id: &str) -> Result<&'a mut MirrorGroup> {
    groups
        .iter_mut()
        .find(|g| g.id == id)
        .ok_or_else(|| Error::GroupNotFound { id: id.to_string() })
}

fn load_groups(path: &Path) -> Vec<MirrorGroup> {
    if !path.exists() {
        return Vec::new();
    }
    let document = match mirror_fs::io::read_text(path)
        .map_err(|e| e.to_string())
        .and_then(|s| serde_json::from_str::<RegistryDocument>(&s).map_err(|e| e.to_string()))
    {
        Ok(document) => document,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "ignoring unreadable registry");
            return Vec::new();
        }
    };

    let mut groups: Vec<MirrorGroup> = Vec::new();
    for value in document.groups {
        match serde_json::from_value::<MirrorGroup>(value) {
            Ok(group) if groups.iter().any(|g| g.id == group.id) => {
                warn!(id = %group.id, "skipping duplicate group id in registry");
            }
            Ok(group) => groups.push(group),
            Err(e) => warn!(error = %e, "skipping malformed group record"),
        }
    }
    debug!(path = %path.display(), count = groups.len(), "loaded registry");
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_writes_versioned_document() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Registry::open(dir.path().join("mirror_groups.json"));

        registry.create_group(["/x/a", "/x/b"], None, true).unwrap();

        let raw = std::fs::read_to_string(registry.path()).unwrap();
        assert!(raw.contains("\"version\": 1"));
        assert!(raw.contains("\"sync_enabled\": true"));
    }

    #[test]
    fn malformed_group_records_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mirror_groups.json");
        std::fs::write(
            &path,
            r#"{"groups": [{"id": "ok", "folders": ["/a", "/b"]}, {"id": 5}]}"#,
        )
        .unwrap();

        let registry = Registry::open(&path);

        let groups = registry.list_groups();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].id, "ok");
    }

    #[test]
    fn failed_save_leaves_table_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the file should be makes every save fail.
        let path = dir.path().join("registry.json");
        std::fs::create_dir(&path).unwrap();
        let registry = Registry::open(&path);

        let result = registry.create_group(["/a", "/b"], None, true);

        assert!(matches!(result, Err(Error::Persistence { .. })));
        assert!(registry.list_groups().is_empty());
    }
}
