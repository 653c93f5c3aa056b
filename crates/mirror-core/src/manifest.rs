//! Per-group sync manifests
//!
//! A manifest records the relative paths the sync engine last confirmed as
//! present in every member folder. It is what lets a full sync tell "not
//! yet propagated" apart from "deleted somewhere, delete everywhere".
//! Manifests are stored outside the group record, one JSON file per group
//! id, and are rewritten wholesale by each full sync pass.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Version 2 stores paths in the escaped [`mirror_fs::to_relative_string`]
/// form; version 1 stored plain names.
const MANIFEST_VERSION: u32 = 2;

/// On-disk manifest document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncManifest {
    /// Manifest format version for forward compatibility
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub group_id: String,
    /// Relative paths with `/` separators, escaped
    #[serde(default)]
    pub paths: BTreeSet<String>,
}

impl SyncManifest {
    pub fn new(group_id: &str, paths: BTreeSet<String>) -> Self {
        Self {
            version: MANIFEST_VERSION,
            group_id: group_id.to_string(),
            paths,
        }
    }
}

/// Directory of manifest files keyed by group id
#[derive(Debug, Clone)]
pub struct ManifestStore {
    dir: PathBuf,
}

impl ManifestStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File holding the manifest for `group_id`.
    ///
    /// Ids may come from marker files written elsewhere. Every byte that is
    /// not ASCII alphanumeric or `-` is written as `_` plus two hex digits,
    /// so distinct ids always get distinct files and none can leave `dir`.
    pub fn path_for(&self, group_id: &str) -> PathBuf {
        let mut safe = String::with_capacity(group_id.len());
        for byte in group_id.bytes() {
            if byte.is_ascii_alphanumeric() || byte == b'-' {
                safe.push(char::from(byte));
            } else {
                safe.push_str(&format!("_{byte:02x}"));
            }
        }
        self.dir.join(format!("{safe}.json"))
    }

    /// Load the set of synced paths for `group_id`.
    ///
    /// A missing manifest is an empty set. An unreadable or malformed one
    /// is an error: syncing without the prior state could resurrect files
    /// the user deleted.
    pub fn load(&self, group_id: &str) -> Result<BTreeSet<String>> {
        let path = self.path_for(group_id);
        if !path.exists() {
            return Ok(BTreeSet::new());
        }
        let content =
            mirror_fs::io::read_text(&path).map_err(|e| Error::persistence(&path, e))?;
        let manifest: SyncManifest =
            serde_json::from_str(&content).map_err(|e| Error::persistence(&path, e))?;
        debug!(group_id, entries = manifest.paths.len(), "loaded sync manifest");
        if manifest.version < 2 {
            return Ok(manifest.paths.iter().map(|p| p.replace('%', "%25")).collect());
        }
        Ok(manifest.paths)
    }

    /// Replace the manifest for `group_id`.
    pub fn save(&self, group_id: &str, paths: &BTreeSet<String>) -> Result<()> {
        let path = self.path_for(group_id);
        let manifest = SyncManifest::new(group_id, paths.clone());
        let content =
            serde_json::to_string_pretty(&manifest).map_err(|e| Error::persistence(&path, e))?;
        mirror_fs::io::write_text(&path, &content).map_err(|e| Error::persistence(&path, e))?;
        debug!(group_id, entries = paths.len(), "saved sync manifest");
        Ok(())
    }

    /// Drop the manifest for `group_id`, if any.
    pub fn remove(&self, group_id: &str) {
        let path = self.path_for(group_id);
        match std::fs::remove_file(&path) {
            Ok(()) => debug!(group_id, "removed sync manifest"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), error = %e, "failed to remove sync manifest"),
        }
    }
}
