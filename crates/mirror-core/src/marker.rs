//! Per-folder membership markers
//!
//! Each member folder carries a hidden `.hardlink_mirror` file holding the
//! owning group's id, so membership can be recovered without the registry.
//! Markers are best-effort: write and remove failures are logged and
//! swallowed, and a marker may outlive its group.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// File name of the marker placed in every member folder.
pub const MARKER_FILE_NAME: &str = ".hardlink_mirror";

#[derive(Debug, Serialize, Deserialize)]
struct MarkerFile {
    group_id: String,
}

pub fn marker_path(folder: &Path) -> PathBuf {
    folder.join(MARKER_FILE_NAME)
}

/// True if `name` is the marker file name.
pub fn is_marker_name(name: &std::ffi::OsStr) -> bool {
    name == MARKER_FILE_NAME
}

/// Tag `folder` as a member of `group_id`.
pub fn write_marker(folder: &Path, group_id: &str) {
    let path = marker_path(folder);
    let content = match serde_json::to_string(&MarkerFile {
        group_id: group_id.to_string(),
    }) {
        Ok(content) => content,
        Err(e) => {
            warn!(error = %e, "failed to encode marker");
            return;
        }
    };
    // Hidden files cannot be truncated in place on Windows.
    #[cfg(windows)]
    let _ = fs::remove_file(&path);
    if let Err(e) = fs::write(&path, content) {
        warn!(path = %path.display(), error = %e, "failed to write mirror marker");
        return;
    }
    hide(&path);
    debug!(path = %path.display(), group_id, "wrote mirror marker");
}

/// The group id stored in `folder`'s marker, if it has a readable one.
pub fn read_marker(folder: &Path) -> Option<String> {
    let content = fs::read_to_string(marker_path(folder)).ok()?;
    serde_json::from_str::<MarkerFile>(&content)
        .ok()
        .map(|m| m.group_id)
}

pub fn has_marker(folder: &Path) -> bool {
    marker_path(folder).is_file()
}

/// Remove `folder`'s marker if present.
pub fn remove_marker(folder: &Path) {
    let path = marker_path(folder);
    match fs::remove_file(&path) {
        Ok(()) => debug!(path = %path.display(), "removed mirror marker"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "failed to remove mirror marker"),
    }
}

#[cfg(windows)]
fn hide(path: &Path) {
    use windows::Win32::Storage::FileSystem::{FILE_ATTRIBUTE_HIDDEN, SetFileAttributesW};
    use windows::core::HSTRING;

    let wide = HSTRING::from(path.as_os_str());
    if let Err(e) = unsafe { SetFileAttributesW(&wide, FILE_ATTRIBUTE_HIDDEN) } {
        debug!(path = %path.display(), error = %e, "could not hide marker");
    }
}

// The leading dot already hides the file elsewhere.
#[cfg(not(windows))]
fn hide(_path: &Path) {}
