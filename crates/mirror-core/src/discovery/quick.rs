//! Marker-only rescan

use super::{Discovery, Progress, existing_dirs};
use crate::group::MirrorGroup;
use crate::marker::read_marker;
use crate::Result;
use mirror_fs::NormalizedPath;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};
use walkdir::WalkDir;

impl Discovery<'_> {
    /// Rebuild groups from the markers found under `roots`.
    ///
    /// Folders are clustered by the group id stored in their marker; every
    /// cluster of two or more that is not already a registered folder set
    /// becomes a group. An orphaned marker id (no live group) is reused as
    /// the new group's id. No file contents are read.
    ///
    /// `progress` receives `(directories_scanned, markers_found)` every
    /// configured interval and once at the end.
    pub fn quick_scan<P: AsRef<Path>>(
        &self,
        roots: &[P],
        mut progress: Progress<'_>,
    ) -> Result<Vec<MirrorGroup>> {
        let roots = existing_dirs(roots);
        if roots.is_empty() {
            return Ok(Vec::new());
        }

        let mut clusters: BTreeMap<String, Vec<NormalizedPath>> = BTreeMap::new();
        let mut dirs_scanned = 0usize;
        let mut markers_found = 0usize;

        for root in &roots {
            let dirs = WalkDir::new(root.as_path())
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_dir());
            for entry in dirs {
                dirs_scanned += 1;
                if let Some(id) = read_marker(entry.path()) {
                    markers_found += 1;
                    let folder = NormalizedPath::new(entry.path());
                    let folders = clusters.entry(id).or_default();
                    if !folders.contains(&folder) {
                        folders.push(folder);
                    }
                }
                if dirs_scanned % self.progress_interval == 0
                    && let Some(report) = progress.as_mut()
                {
                    report(dirs_scanned, markers_found);
                }
            }
        }
        if let Some(report) = progress.as_mut() {
            report(dirs_scanned, markers_found);
        }
        debug!(dirs_scanned, markers_found, clusters = clusters.len(), "quick scan walked roots");

        let mut created = Vec::new();
        for (id, folders) in clusters {
            if let Some(group) = self.register(Some(&id), folders)? {
                created.push(group);
            }
        }
        info!(created = created.len(), "quick scan finished");
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marker::write_marker;
    use crate::registry::Registry;
    use std::fs;

    #[test]
    fn clusters_by_marker_and_reuses_orphan_id() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("data");
        for name in ["a", "b", "lonely"] {
            fs::create_dir_all(root.join(name)).unwrap();
        }
        write_marker(&root.join("a"), "orphan-1");
        write_marker(&root.join("b"), "orphan-1");
        write_marker(&root.join("lonely"), "orphan-2");
        let registry = Registry::open(tmp.path().join("groups.json"));

        let mut calls = Vec::new();
        let mut progress = |done: usize, found: usize| calls.push((done, found));
        let created = Discovery::new(&registry)
            .quick_scan(&[&root], Some(&mut progress))
            .unwrap();

        assert_eq!(created.len(), 1);
        assert_eq!(created[0].id, "orphan-1");
        assert_eq!(created[0].folders.len(), 2);
        assert_eq!(calls.last(), Some(&(4, 3)));
    }

    #[test]
    fn second_scan_registers_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        for name in ["a", "b"] {
            fs::create_dir_all(tmp.path().join(name)).unwrap();
            write_marker(&tmp.path().join(name), "g");
        }
        let registry = Registry::open(tmp.path().join("groups.json"));
        let discovery = Discovery::new(&registry);

        assert_eq!(discovery.quick_scan(&[tmp.path()], None).unwrap().len(), 1);
        assert!(discovery.quick_scan(&[tmp.path()], None).unwrap().is_empty());
    }
}
