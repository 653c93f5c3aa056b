//! File identity queries
//!
//! A [`FileIdentity`] is the `(volume, file index)` pair the OS uses to name
//! the underlying data of a file. Two directory entries with equal identity
//! are hardlinks to the same data.

use crate::{Error, Result};
use std::path::Path;

/// The `(device/volume id, file sequence number)` pair of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileIdentity {
    pub volume: u64,
    pub index: u64,
}

impl std::fmt::Display for FileIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.volume, self.index)
    }
}

/// Identity of the file at `path`, following symlinks.
pub fn identity(path: &Path) -> Result<FileIdentity> {
    query(path)
        .map(|(id, _)| id)
        .map_err(|e| Error::io(path, e))
}

/// Number of directory entries that reference the data behind `path`.
pub fn link_count(path: &Path) -> Result<u64> {
    query(path)
        .map(|(_, links)| links)
        .map_err(|e| Error::io(path, e))
}

/// Volume id of `path` (a file or a directory).
pub fn volume_id(path: &Path) -> Result<u64> {
    identity(path).map(|id| id.volume)
}

/// True if both paths live on the same volume.
///
/// Hardlinks can only be created within a single volume.
pub fn is_same_volume(a: &Path, b: &Path) -> Result<bool> {
    Ok(volume_id(a)? == volume_id(b)?)
}

/// True if `path` is a regular file and not a symlink.
pub fn is_regular_file(path: &Path) -> bool {
    std::fs::symlink_metadata(path)
        .map(|m| m.file_type().is_file())
        .unwrap_or(false)
}

#[cfg(unix)]
fn query(path: &Path) -> std::io::Result<(FileIdentity, u64)> {
    use std::os::unix::fs::MetadataExt;

    let meta = std::fs::metadata(path)?;
    Ok((
        FileIdentity {
            volume: meta.dev(),
            index: meta.ino(),
        },
        meta.nlink(),
    ))
}

#[cfg(windows)]
fn query(path: &Path) -> std::io::Result<(FileIdentity, u64)> {
    use std::os::windows::fs::OpenOptionsExt;
    use std::os::windows::io::AsRawHandle;
    use windows::Win32::Foundation::HANDLE;
    use windows::Win32::Storage::FileSystem::{
        BY_HANDLE_FILE_INFORMATION, FILE_FLAG_BACKUP_SEMANTICS, GetFileInformationByHandle,
    };

    // Backup semantics lets the same call open directories.
    let file = std::fs::OpenOptions::new()
        .access_mode(0)
        .custom_flags(FILE_FLAG_BACKUP_SEMANTICS.0)
        .open(path)?;

    let mut info = BY_HANDLE_FILE_INFORMATION::default();
    unsafe { GetFileInformationByHandle(HANDLE(file.as_raw_handle()), &mut info) }
        .map_err(std::io::Error::from)?;

    Ok((
        FileIdentity {
            volume: u64::from(info.dwVolumeSerialNumber),
            index: (u64::from(info.nFileIndexHigh) << 32) | u64::from(info.nFileIndexLow),
        },
        u64::from(info.nNumberOfLinks),
    ))
}
