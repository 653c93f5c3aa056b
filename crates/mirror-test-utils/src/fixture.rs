//! [`MirrorFixture`] builder for mirror group test scenarios.

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A temporary directory holding member folders and a private registry
/// location, with helpers for setup and assertion.
///
/// # Example
///
/// ```rust,no_run
/// use mirror_test_utils::MirrorFixture;
///
/// let fx = MirrorFixture::new();
/// let p = fx.folder("P");
/// let q = fx.folder("Q");
/// fx.write("P/notes/x.txt", "hello");
/// fx.assert_exists("P/notes/x.txt");
/// ```
pub struct MirrorFixture {
    temp_dir: TempDir,
}

impl Default for MirrorFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl MirrorFixture {
    /// Create an empty temporary directory.
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().unwrap(),
        }
    }

    /// Root of the temporary tree.
    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Absolute path of `rel` under the root. Nothing is created.
    pub fn path(&self, rel: &str) -> PathBuf {
        self.root().join(rel)
    }

    /// Create directory `rel` (and parents) and return its path.
    pub fn folder(&self, rel: &str) -> PathBuf {
        let path = self.path(rel);
        fs::create_dir_all(&path).unwrap();
        path
    }

    /// Write `content` to `rel`, creating parent directories.
    pub fn write(&self, rel: &str, content: &str) -> PathBuf {
        let path = self.path(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    /// Registry file location, kept outside every member folder.
    pub fn registry_path(&self) -> PathBuf {
        self.path("state/mirror_groups.json")
    }

    /// Number of directory entries sharing `rel`'s data.
    pub fn link_count(&self, rel: &str) -> u64 {
        mirror_fs::link_count(&self.path(rel)).unwrap()
    }

    /// Assert that `rel` exists.
    ///
    /// # Panics
    /// Panics with a descriptive message if the path does not exist.
    pub fn assert_exists(&self, rel: &str) {
        let full_path = self.path(rel);
        assert!(
            fs::symlink_metadata(&full_path).is_ok(),
            "Expected path to exist: {}",
            full_path.display()
        );
    }

    /// Assert that `rel` does **not** exist.
    ///
    /// # Panics
    /// Panics with a descriptive message if the path exists.
    pub fn assert_not_exists(&self, rel: &str) {
        let full_path = self.path(rel);
        assert!(
            fs::symlink_metadata(&full_path).is_err(),
            "Expected path NOT to exist: {}",
            full_path.display()
        );
    }

    /// Assert that `a` and `b` are hardlinks to the same data.
    ///
    /// # Panics
    /// Panics if either path cannot be stat'ed or their identities differ.
    pub fn assert_same_file(&self, a: &str, b: &str) {
        let (pa, pb) = (self.path(a), self.path(b));
        let ia = mirror_fs::identity(&pa)
            .unwrap_or_else(|e| panic!("Could not stat {}: {e}", pa.display()));
        let ib = mirror_fs::identity(&pb)
            .unwrap_or_else(|e| panic!("Could not stat {}: {e}", pb.display()));
        assert_eq!(ia, ib, "{} and {} are not the same file", pa.display(), pb.display());
    }
}
