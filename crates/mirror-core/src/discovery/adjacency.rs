//! Hardlink-adjacency discovery
//!
//! Two folders are adjacent when some file identity appears in both.
//! Connected components of that relation are mirror groups. Only identity
//! metadata is read, never file contents, so this finds mirrors that
//! already share links but not independent copies.

use super::{Discovery, existing_dirs};
use crate::group::MirrorGroup;
use crate::Result;
use mirror_fs::{FileIdentity, NormalizedPath, identity};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use tracing::{debug, info};
use walkdir::WalkDir;

/// Disjoint-set forest over `0..n`
#[derive(Debug, Clone)]
pub struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    pub fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    /// Representative of `x`'s set, halving the path on the way up.
    pub fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    /// Merge the sets of `a` and `b` by attaching `a`'s root under `b`'s.
    pub fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra != rb {
            self.parent[ra] = rb;
        }
    }

    /// All sets, each listed in ascending index order, ordered by their
    /// smallest member.
    pub fn components(&mut self) -> Vec<Vec<usize>> {
        let mut by_root: HashMap<usize, usize> = HashMap::new();
        let mut out: Vec<Vec<usize>> = Vec::new();
        for x in 0..self.parent.len() {
            let root = self.find(x);
            let slot = *by_root.entry(root).or_insert_with(|| {
                out.push(Vec::new());
                out.len() - 1
            });
            out[slot].push(x);
        }
        out
    }
}

/// Group `folders` into connected components of the shares-a-hardlink
/// relation. Only components with two or more folders are returned.
pub fn link_components(folders: &[NormalizedPath]) -> Vec<Vec<NormalizedPath>> {
    let mut owners: HashMap<FileIdentity, BTreeSet<usize>> = HashMap::new();
    for (idx, folder) in folders.iter().enumerate() {
        let files = WalkDir::new(folder.as_path())
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file());
        for entry in files {
            match identity(entry.path()) {
                Ok(id) => {
                    owners.entry(id).or_default().insert(idx);
                }
                Err(e) => debug!(path = %entry.path().display(), error = %e, "skipping entry"),
            }
        }
    }

    let mut sets = UnionFind::new(folders.len());
    for indices in owners.values().filter(|s| s.len() >= 2) {
        let mut iter = indices.iter();
        if let Some(&first) = iter.next() {
            for &other in iter {
                sets.union(first, other);
            }
        }
    }

    sets.components()
        .into_iter()
        .filter(|c| c.len() >= 2)
        .map(|c| c.into_iter().map(|i| folders[i].clone()).collect())
        .collect()
}

impl Discovery<'_> {
    /// Register every group of `folders` that already shares hardlinks.
    pub fn scan_hardlink_mirrors<P: AsRef<Path>>(&self, folders: &[P]) -> Result<Vec<MirrorGroup>> {
        let folders = existing_dirs(folders);
        if folders.len() < 2 {
            return Ok(Vec::new());
        }

        let mut created = Vec::new();
        for component in link_components(&folders) {
            if let Some(group) = self.register(None, component)? {
                created.push(group);
            }
        }
        info!(created = created.len(), "hardlink scan finished");
        Ok(created)
    }
}
