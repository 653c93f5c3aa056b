//! Recursive content fingerprinting
//!
//! A directory's fingerprint is the SHA-256 of its sorted file content
//! hashes and sorted child fingerprints:
//!
//! ```text
//! sha256( join(";", sorted file hashes) + "|" + join(";", sorted child fps) )
//! ```
//!
//! Names never enter the hash, so two trees with the same shape and bytes
//! fingerprint equally however their entries are named. Empty directories
//! (after excluding the marker) have no fingerprint and never match.

use super::{Discovery, Progress, existing_dirs};
use crate::marker::{has_marker, is_marker_name};
use crate::Result;
use mirror_fs::NormalizedPath;
use mirror_fs::checksum::{compute_content_checksum, compute_file_checksum};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const DIR_REPORT_INTERVAL: usize = 20;
const FILE_REPORT_INTERVAL: usize = 50;

/// Folder sets found by [`Discovery::scan_content_mirrors`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContentScanResult {
    /// Every folder already carries a marker; safe to register directly.
    pub auto_confirmed: Vec<Vec<NormalizedPath>>,
    /// Matches that need confirmation before registering.
    pub candidates: Vec<Vec<NormalizedPath>>,
}

impl ContentScanResult {
    pub fn is_empty(&self) -> bool {
        self.auto_confirmed.is_empty() && self.candidates.is_empty()
    }
}

/// Traversal context for fingerprinting.
///
/// Owns the per-directory cache (so overlapping roots are hashed once) and
/// the progress counters.
pub struct FingerprintScan<'p> {
    cache: HashMap<PathBuf, Option<String>>,
    dirs: usize,
    files: usize,
    progress: Progress<'p>,
}

impl Default for FingerprintScan<'_> {
    fn default() -> Self {
        Self::new(None)
    }
}

impl<'p> FingerprintScan<'p> {
    /// `progress` receives `(directories_fingerprinted, files_hashed)`.
    pub fn new(progress: Progress<'p>) -> Self {
        Self {
            cache: HashMap::new(),
            dirs: 0,
            files: 0,
            progress,
        }
    }

    pub fn dirs_fingerprinted(&self) -> usize {
        self.dirs
    }

    pub fn files_hashed(&self) -> usize {
        self.files
    }

    /// Fingerprint of `dir`, or `None` if it is empty or unreadable.
    pub fn fingerprint(&mut self, dir: &Path) -> Option<String> {
        if let Some(cached) = self.cache.get(dir) {
            return cached.clone();
        }

        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(path = %dir.display(), error = %e, "skipping unreadable directory");
                self.cache.insert(dir.to_path_buf(), None);
                return None;
            }
        };

        let mut file_hashes = Vec::new();
        let mut child_fps = Vec::new();
        for entry in entries.filter_map(|e| e.ok()) {
            // Symlinks are neither files nor directories here.
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            if file_type.is_file() {
                if is_marker_name(&entry.file_name()) {
                    continue;
                }
                if let Some(hash) = self.hash_file(&entry.path()) {
                    file_hashes.push(hash);
                }
            } else if file_type.is_dir()
                && let Some(fp) = self.fingerprint(&entry.path())
            {
                child_fps.push(fp);
            }
        }

        if file_hashes.is_empty() && child_fps.is_empty() {
            self.cache.insert(dir.to_path_buf(), None);
            return None;
        }

        file_hashes.sort();
        child_fps.sort();
        let combined =
            compute_content_checksum(&format!("{}|{}", file_hashes.join(";"), child_fps.join(";")));

        self.cache.insert(dir.to_path_buf(), Some(combined.clone()));
        self.dirs += 1;
        if self.dirs % DIR_REPORT_INTERVAL == 0 {
            self.report();
        }
        Some(combined)
    }

    fn hash_file(&mut self, path: &Path) -> Option<String> {
        match compute_file_checksum(path) {
            Ok(hash) => {
                self.files += 1;
                if self.files % FILE_REPORT_INTERVAL == 0 {
                    self.report();
                }
                Some(hash)
            }
            Err(e) => {
                debug!(path = %path.display(), error = %e, "skipping unreadable file");
                None
            }
        }
    }

    fn report(&mut self) {
        if let Some(report) = &mut self.progress {
            report(self.dirs, self.files);
        }
    }

    /// Every fingerprinted directory grouped by fingerprint.
    fn into_clusters(self) -> Vec<Vec<NormalizedPath>> {
        let mut by_fp: BTreeMap<String, BTreeSet<NormalizedPath>> = BTreeMap::new();
        for (dir, fp) in self.cache {
            if let Some(fp) = fp {
                by_fp.entry(fp).or_default().insert(NormalizedPath::new(dir));
            }
        }
        by_fp
            .into_values()
            .map(|set| set.into_iter().collect())
            .collect()
    }
}

/// Fingerprint a single directory tree.
pub fn fingerprint_dir(dir: &Path) -> Option<String> {
    FingerprintScan::default().fingerprint(dir)
}

/// Drop every folder that is an ancestor of another folder in the set.
fn drop_ancestors(folders: Vec<NormalizedPath>) -> Vec<NormalizedPath> {
    folders
        .iter()
        .filter(|f| !folders.iter().any(|other| other != *f && other.is_within(f)))
        .cloned()
        .collect()
}

impl Discovery<'_> {
    /// Find directories under `roots` whose recursive contents are
    /// byte-identical.
    ///
    /// Nothing is registered: callers register
    /// [`ContentScanResult::auto_confirmed`] directly and confirm
    /// candidates first (see [`Discovery::register_folder_sets`]).
    pub fn scan_content_mirrors<P: AsRef<Path>>(
        &self,
        roots: &[P],
        progress: Progress<'_>,
    ) -> Result<ContentScanResult> {
        let roots = existing_dirs(roots);
        let mut scan = FingerprintScan::new(progress);
        for root in &roots {
            scan.fingerprint(root.as_path());
        }
        scan.report();
        info!(
            dirs = scan.dirs_fingerprinted(),
            files = scan.files_hashed(),
            "content fingerprinting finished"
        );

        let mut result = ContentScanResult::default();
        for cluster in scan.into_clusters() {
            if cluster.len() < 2 {
                continue;
            }
            let folders = drop_ancestors(cluster);
            if folders.len() < 2 || self.registry.has_folder_set(&folders) {
                continue;
            }
            if folders.iter().all(|f| has_marker(f.as_path())) {
                result.auto_confirmed.push(folders);
            } else {
                result.candidates.push(folders);
            }
        }
        result.auto_confirmed.sort();
        result.candidates.sort();
        Ok(result)
    }
}
