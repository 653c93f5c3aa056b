//! Folder symlink primitives
//!
//! Folder symlinks are carried through mirror groups as opaque entries:
//! the link itself is replicated, its target is never traversed.

use crate::{Error, NormalizedPath, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// True if `path` is a symlink (the link itself, not its target).
pub fn is_symlink(path: &Path) -> bool {
    fs::symlink_metadata(path)
        .map(|m| m.file_type().is_symlink())
        .unwrap_or(false)
}

/// True if `path` is a symlink that points at a directory.
pub fn is_folder_symlink(path: &Path) -> bool {
    is_symlink(path) && path.is_dir()
}

/// True if `path` is a symlink whose target no longer exists.
pub fn is_symlink_broken(path: &Path) -> bool {
    is_symlink(path) && fs::metadata(path).is_err()
}

/// The raw target stored in the symlink at `path`.
pub fn read_symlink_target(path: &Path) -> Result<PathBuf> {
    if !is_symlink(path) {
        if fs::symlink_metadata(path).is_err() {
            return Err(Error::NotFound {
                path: path.to_path_buf(),
            });
        }
        return Err(Error::NotASymlink {
            path: path.to_path_buf(),
        });
    }
    fs::read_link(path).map_err(|e| Error::io(path, e))
}

/// Create a directory symlink at `link` pointing at `target`, verbatim.
///
/// No validation of `target` is performed; this is what sync uses to
/// replicate an existing link exactly.
pub fn create_symlink(target: &Path, link: &Path) -> Result<PathBuf> {
    if fs::symlink_metadata(link).is_ok() {
        return Err(Error::AlreadyExists {
            path: link.to_path_buf(),
        });
    }
    platform_symlink_dir(target, link).map_err(|e| Error::io(link, e))?;
    debug!(target = %target.display(), link = %link.display(), "created symlink");
    Ok(link.to_path_buf())
}

/// Create a symlink to the folder `target` inside `dest_dir`.
///
/// The link is named `link_name`, or after the target folder when `None`,
/// and stores the absolute target path.
pub fn create_folder_symlink(
    target: &Path,
    dest_dir: &Path,
    link_name: Option<&str>,
) -> Result<PathBuf> {
    let target = NormalizedPath::new(target);
    if !target.exists() {
        return Err(Error::NotFound {
            path: target.to_native(),
        });
    }
    if !target.is_dir() {
        return Err(Error::NotADirectory {
            path: target.to_native(),
        });
    }
    let dest_dir = NormalizedPath::new(dest_dir);
    if !dest_dir.is_dir() {
        return Err(Error::NotADirectory {
            path: dest_dir.to_native(),
        });
    }

    let name = link_name
        .or_else(|| target.file_name())
        .ok_or_else(|| Error::NotADirectory {
            path: target.to_native(),
        })?;
    create_symlink(target.as_path(), &dest_dir.as_path().join(name))
}

/// Remove a folder symlink without touching its target.
pub fn delete_folder_symlink(path: &Path) -> Result<()> {
    let meta = fs::symlink_metadata(path).map_err(|e| Error::io(path, e))?;
    if !meta.file_type().is_symlink() {
        return Err(Error::NotASymlink {
            path: path.to_path_buf(),
        });
    }
    crate::links::remove_entry(path)
}

#[cfg(unix)]
fn platform_symlink_dir(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn platform_symlink_dir(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::windows::fs::symlink_dir(target, link)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn target_folder(root: &Path) -> PathBuf {
        let target = root.join("target_data");
        fs::create_dir_all(target.join("subdir")).unwrap();
        fs::write(target.join("readme.txt"), "hello").unwrap();
        target
    }

    #[test]
    fn creates_symlink_named_after_target() {
        let dir = tempfile::tempdir().unwrap();
        let target = target_folder(dir.path());
        let dest = dir.path().join("dest");
        fs::create_dir(&dest).unwrap();

        let link = create_folder_symlink(&target, &dest, None).unwrap();

        assert_eq!(link.file_name().unwrap(), "target_data");
        assert!(is_folder_symlink(&link));
        assert_eq!(read_symlink_target(&link).unwrap(), target);
    }

    #[test]
    fn rejects_file_target() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("file.txt");
        fs::write(&file, "data").unwrap();

        let err = create_folder_symlink(&file, dir.path(), Some("link")).unwrap_err();
        assert!(matches!(err, Error::NotADirectory { .. }));
    }

    #[test]
    fn name_collision_is_already_exists() {
        let dir = tempfile::tempdir().unwrap();
        let target = target_folder(dir.path());
        let dest = dir.path().join("dest");
        fs::create_dir_all(dest.join("target_data")).unwrap();

        let err = create_folder_symlink(&target, &dest, None).unwrap_err();
        assert!(matches!(err, Error::AlreadyExists { .. }));
    }

    #[test]
    fn delete_leaves_target_intact() {
        let dir = tempfile::tempdir().unwrap();
        let target = target_folder(dir.path());
        let link = dir.path().join("link");
        create_symlink(&target, &link).unwrap();

        delete_folder_symlink(&link).unwrap();

        assert!(!is_symlink(&link));
        assert!(target.join("readme.txt").exists());
    }

    #[test]
    fn delete_refuses_regular_directory() {
        let dir = tempfile::tempdir().unwrap();
        let err = delete_folder_symlink(dir.path()).unwrap_err();
        assert!(matches!(err, Error::NotASymlink { .. }));
    }

    #[test]
    fn broken_link_detected_after_target_removed() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("temp_target");
        fs::create_dir(&target).unwrap();
        let link = dir.path().join("link");
        create_symlink(&target, &link).unwrap();
        assert!(!is_symlink_broken(&link));

        fs::remove_dir(&target).unwrap();
        assert!(is_symlink_broken(&link));
    }
}
