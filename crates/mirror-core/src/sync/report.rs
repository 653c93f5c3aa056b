//! Result of a full group sync

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// What a [`super::SyncEngine::sync_group`] pass changed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncReport {
    /// Links created, destination to source
    pub created: BTreeMap<PathBuf, PathBuf>,
    /// Entries removed by deletion propagation
    pub deleted: Vec<PathBuf>,
    /// Destinations left alone because an unrelated entry holds the name
    pub collisions: Vec<PathBuf>,
    /// Per-entry failures that were skipped
    pub errors: Vec<String>,
}

impl SyncReport {
    /// True if the pass changed nothing on disk.
    pub fn is_noop(&self) -> bool {
        self.created.is_empty() && self.deleted.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// One-line summary for status output.
    pub fn summary(&self) -> String {
        let mut out = format!(
            "{} linked, {} deleted",
            self.created.len(),
            self.deleted.len()
        );
        if !self.collisions.is_empty() {
            out.push_str(&format!(", {} collisions", self.collisions.len()));
        }
        if !self.errors.is_empty() {
            out.push_str(&format!(", {} errors", self.errors.len()));
        }
        out
    }
}
