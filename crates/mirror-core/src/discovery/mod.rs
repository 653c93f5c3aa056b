//! Mirror group discovery
//!
//! Three independent ways to populate the registry from what is already on
//! disk:
//!
//! - **quick**: cluster folders by the group id in their markers
//! - **fingerprint**: match directories whose recursive contents are
//!   byte-identical, ignoring names
//! - **adjacency**: join folders that already share hardlinked files
//!
//! None of them ever re-registers a folder set that is already a group.
//! Unreadable entries are skipped; only a registry save failure aborts a
//! scan.

mod adjacency;
mod fingerprint;
mod quick;

pub use adjacency::{UnionFind, link_components};
pub use fingerprint::{ContentScanResult, FingerprintScan, fingerprint_dir};

use crate::group::{MIN_SYNC_FOLDERS, MirrorGroup};
use crate::registry::Registry;
use crate::Result;
use mirror_fs::NormalizedPath;
use std::path::Path;
use tracing::debug;

/// Progress callback receiving `(units_done, units_found)`.
pub type Progress<'a> = Option<&'a mut dyn FnMut(usize, usize)>;

/// Directories between quick-scan progress reports.
pub const DEFAULT_PROGRESS_INTERVAL: usize = 50;

/// Runs discovery scans against a registry
pub struct Discovery<'r> {
    registry: &'r Registry,
    progress_interval: usize,
}

impl<'r> Discovery<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Self {
            registry,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }

    /// Report quick-scan progress every `interval` directories.
    pub fn with_progress_interval(mut self, interval: usize) -> Self {
        self.progress_interval = interval.max(1);
        self
    }

    /// Register each folder set as a new group, skipping sets that are
    /// already registered. Used for confirmed content-scan results.
    pub fn register_folder_sets(&self, sets: &[Vec<NormalizedPath>]) -> Result<Vec<MirrorGroup>> {
        let mut created = Vec::new();
        for folders in sets {
            if let Some(group) = self.register(None, folders.clone())? {
                created.push(group);
            }
        }
        Ok(created)
    }

    /// Create a group for `folders` unless it is too small or already
    /// registered. `reuse_id` is honoured when no live group holds it.
    fn register(
        &self,
        reuse_id: Option<&str>,
        folders: Vec<NormalizedPath>,
    ) -> Result<Option<MirrorGroup>> {
        if folders.len() < MIN_SYNC_FOLDERS || self.registry.has_folder_set(&folders) {
            return Ok(None);
        }
        let group = match reuse_id {
            Some(id) if self.registry.get_group(id).is_none() => {
                MirrorGroup::with_id(id, &folders, None, true)
            }
            _ => MirrorGroup::new(&folders, None, true),
        };
        debug!(id = %group.id, folders = folders.len(), "registering discovered group");
        self.registry.insert_group(group).map(Some)
    }
}

/// Normalize `roots`, dropping duplicates and anything that is not a
/// directory.
fn existing_dirs<P: AsRef<Path>>(roots: &[P]) -> Vec<NormalizedPath> {
    let mut out: Vec<NormalizedPath> = Vec::new();
    for root in roots {
        let root = NormalizedPath::new(root);
        if root.is_dir() && !out.contains(&root) {
            out.push(root);
        }
    }
    out
}
