//! Hardlink create/delete/enumerate primitives
//!
//! These are the user-actionable operations: every failure comes back as a
//! typed [`Error`] so the caller can explain it.

use crate::identity::{identity, volume_id};
use crate::{Error, NormalizedPath, Result};
use std::collections::BTreeSet;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Create a hardlink to `source` inside `dest_dir`.
///
/// The new entry is named `dest_name`, or after the source file when `None`.
/// Returns the path of the created link.
///
/// # Errors
///
/// - [`Error::NotFound`] if `source` does not exist
/// - [`Error::NotARegularFile`] if `source` is a directory or symlink
/// - [`Error::NotADirectory`] if `dest_dir` is not a directory
/// - [`Error::CrossVolume`] if the two live on different volumes
/// - [`Error::AlreadyExists`] if the destination name is taken
pub fn create_hardlink(source: &Path, dest_dir: &Path, dest_name: Option<&str>) -> Result<PathBuf> {
    let source = NormalizedPath::new(source).to_native();
    let dest_dir = NormalizedPath::new(dest_dir).to_native();

    let meta = fs::symlink_metadata(&source).map_err(|e| Error::io(&source, e))?;
    if !meta.file_type().is_file() {
        return Err(Error::NotARegularFile { path: source });
    }

    if !dest_dir.is_dir() {
        return Err(Error::NotADirectory { path: dest_dir });
    }

    if volume_id(&source)? != volume_id(&dest_dir)? {
        return Err(Error::CrossVolume {
            source_path: source,
            dest: dest_dir,
        });
    }

    let name = match dest_name {
        Some(name) => OsStr::new(name),
        None => source.file_name().ok_or_else(|| Error::NotARegularFile {
            path: source.clone(),
        })?,
    };
    let dest = dest_dir.join(name);

    if fs::symlink_metadata(&dest).is_ok() {
        return Err(Error::AlreadyExists { path: dest });
    }

    fs::hard_link(&source, &dest).map_err(|e| Error::io(&dest, e))?;
    debug!(source = %source.display(), dest = %dest.display(), "created hardlink");
    Ok(dest)
}

/// Remove one directory entry of a regular file.
///
/// If other entries share the file's identity the data survives; removing
/// the last entry frees it. Callers that want to warn about the latter
/// should check [`crate::link_count`] first.
pub fn delete_hardlink(path: &Path) -> Result<()> {
    let path = NormalizedPath::new(path).to_native();
    let meta = fs::symlink_metadata(&path).map_err(|e| Error::io(&path, e))?;
    if !meta.file_type().is_file() {
        return Err(Error::NotARegularFile { path });
    }
    fs::remove_file(&path).map_err(|e| Error::io(&path, e))?;
    debug!(path = %path.display(), "deleted hardlink");
    Ok(())
}

/// Remove a file or symlink entry without following it.
///
/// Directories are refused so a stray call can never take a tree with it.
pub fn remove_entry(path: &Path) -> Result<()> {
    let meta = fs::symlink_metadata(path).map_err(|e| Error::io(path, e))?;
    let file_type = meta.file_type();
    if file_type.is_symlink() {
        // Windows directory symlinks are removed as directories.
        fs::remove_file(path)
            .or_else(|_| fs::remove_dir(path))
            .map_err(|e| Error::io(path, e))
    } else if file_type.is_file() {
        fs::remove_file(path).map_err(|e| Error::io(path, e))
    } else {
        Err(Error::NotARegularFile {
            path: path.to_path_buf(),
        })
    }
}

/// Find every entry under `search_dirs` that shares `path`'s identity.
///
/// Directories are walked recursively without following symlinks.
/// Unreadable entries are skipped. The result is normalized, deduplicated
/// and sorted, and includes `path` itself when it lies in a search dir.
pub fn find_all_hardlinks(path: &Path, search_dirs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let target = identity(path)?;
    let mut found = BTreeSet::new();

    for dir in search_dirs {
        let dir = NormalizedPath::new(dir);
        if !dir.is_dir() {
            continue;
        }
        for entry in WalkDir::new(dir.as_path())
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            match identity(entry.path()) {
                Ok(id) if id == target => {
                    found.insert(NormalizedPath::new(entry.path()).to_native());
                }
                Ok(_) => {}
                Err(e) => debug!(path = %entry.path().display(), error = %e, "skipping entry"),
            }
        }
    }

    Ok(found.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ErrorKind, link_count};

    #[test]
    fn create_hardlink_defaults_to_source_name() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("report.txt");
        let dest_dir = dir.path().join("dest");
        fs::write(&source, "content").unwrap();
        fs::create_dir(&dest_dir).unwrap();

        let created = create_hardlink(&source, &dest_dir, None).unwrap();

        assert_eq!(created.file_name().unwrap(), "report.txt");
        assert_eq!(identity(&source).unwrap(), identity(&created).unwrap());
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn create_hardlink_keeps_non_utf8_source_name() {
        use std::os::unix::ffi::OsStrExt;

        let dir = tempfile::tempdir().unwrap();
        let name = OsStr::from_bytes(b"caf\xE9.txt");
        let source = dir.path().join(name);
        let dest_dir = dir.path().join("dest");
        fs::write(&source, "content").unwrap();
        fs::create_dir(&dest_dir).unwrap();

        let created = create_hardlink(&source, &dest_dir, None).unwrap();

        assert_eq!(created, dest_dir.join(name));
    }

    #[test]
    fn create_hardlink_rejects_directory_source() {
        let dir = tempfile::tempdir().unwrap();
        let err = create_hardlink(dir.path(), dir.path(), Some("x")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn create_hardlink_requires_destination_directory() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("a.txt");
        fs::write(&source, "a").unwrap();

        let err = create_hardlink(&source, &dir.path().join("nope"), None).unwrap_err();
        assert!(matches!(err, Error::NotADirectory { .. }));
    }

    #[test]
    fn delete_keeps_data_while_other_links_remain() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.txt");
        fs::write(&a, "shared").unwrap();
        let b = create_hardlink(&a, dir.path(), Some("b.txt")).unwrap();

        delete_hardlink(&a).unwrap();

        assert!(!a.exists());
        assert_eq!(fs::read_to_string(&b).unwrap(), "shared");
        assert_eq!(link_count(&b).unwrap(), 1);
    }

    #[test]
    fn remove_entry_refuses_directories() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("sub");
        fs::create_dir(&sub).unwrap();

        assert!(remove_entry(&sub).is_err());
        assert!(sub.is_dir());
    }
}
