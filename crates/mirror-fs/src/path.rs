//! Normalized absolute path handling
//!
//! Every folder comparison in the workspace goes through [`NormalizedPath`] so
//! that trailing separators, `.`/`..` segments and relative inputs never cause
//! a false mismatch.

use serde::{Deserialize, Serialize};
use std::ffi::{OsStr, OsString};
use std::path::{Component, Path, PathBuf};

/// An absolute, lexically cleaned path.
///
/// Construction resolves relative input against the current directory,
/// drops `.` segments, folds `..` segments and strips trailing separators.
/// Symlinks are *not* resolved: a mirror folder reached through a symlink is
/// a different folder as far as the registry is concerned.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "PathBuf", into = "PathBuf")]
pub struct NormalizedPath {
    inner: PathBuf,
}

impl NormalizedPath {
    /// Create a new NormalizedPath from any path-like input.
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()
                .map(|cwd| cwd.join(path))
                .unwrap_or_else(|_| path.to_path_buf())
        };
        Self {
            inner: clean(dunce::simplified(&absolute)),
        }
    }

    pub fn as_path(&self) -> &Path {
        &self.inner
    }

    /// Convert to a platform-native PathBuf for I/O operations.
    pub fn to_native(&self) -> PathBuf {
        self.inner.clone()
    }

    /// Join a relative path in [`to_relative_string`] form onto this one.
    pub fn join(&self, relative: &str) -> Self {
        let mut inner = self.inner.clone();
        inner.push(from_relative_string(relative));
        Self { inner: clean(&inner) }
    }

    /// Get the parent directory.
    pub fn parent(&self) -> Option<Self> {
        self.inner.parent().map(|p| Self {
            inner: p.to_path_buf(),
        })
    }

    /// Get the file name component.
    pub fn file_name(&self) -> Option<&str> {
        self.inner.file_name().and_then(|n| n.to_str())
    }

    /// True if this path equals `root` or lies beneath it.
    ///
    /// Comparison is per component, so `/data/photos2` is not within
    /// `/data/photos`.
    pub fn is_within(&self, root: &NormalizedPath) -> bool {
        self.inner.starts_with(&root.inner)
    }

    /// The `/`-separated path of `self` relative to `root`.
    ///
    /// Returns `None` when `self` is not within `root` and an empty string
    /// when the two are equal.
    pub fn relative_to(&self, root: &NormalizedPath) -> Option<String> {
        self.inner
            .strip_prefix(&root.inner)
            .ok()
            .map(to_relative_string)
    }

    /// Check if this path exists on the filesystem.
    pub fn exists(&self) -> bool {
        self.inner.exists()
    }

    /// Check if this is a directory.
    pub fn is_dir(&self) -> bool {
        self.inner.is_dir()
    }

    /// Check if this is a file.
    pub fn is_file(&self) -> bool {
        self.inner.is_file()
    }
}

/// Render a relative path with `/` separators regardless of platform.
///
/// This is the form used for manifest entries and inventory keys. It is
/// lossless: `%` and anything that is not valid Unicode in a name (raw bytes
/// on unix, unpaired surrogates on Windows) are percent-escaped, so two
/// distinct names never share a key and [`from_relative_string`] gives back
/// the exact original.
pub fn to_relative_string(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(encode_component(part)),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Inverse of [`to_relative_string`].
pub fn from_relative_string(relative: &str) -> PathBuf {
    relative
        .split('/')
        .filter(|s| !s.is_empty())
        .map(decode_component)
        .collect()
}

fn push_escaped(out: &mut String, c: char) {
    if c == '%' {
        out.push_str("%25");
    } else {
        out.push(c);
    }
}

/// Leading `digits` hex digits of `s`, if all present.
fn hex_prefix(s: &str, digits: usize) -> Option<u32> {
    let hex = s.get(..digits)?;
    if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u32::from_str_radix(hex, 16).ok()
}

#[cfg(unix)]
fn encode_component(part: &OsStr) -> String {
    use std::os::unix::ffi::OsStrExt;

    let mut out = String::with_capacity(part.len());
    for chunk in part.as_bytes().utf8_chunks() {
        chunk.valid().chars().for_each(|c| push_escaped(&mut out, c));
        for byte in chunk.invalid() {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}

#[cfg(unix)]
fn decode_component(encoded: &str) -> OsString {
    use std::os::unix::ffi::OsStringExt;

    let mut bytes = Vec::with_capacity(encoded.len());
    let mut rest = encoded;
    while let Some(pos) = rest.find('%') {
        bytes.extend_from_slice(rest[..pos].as_bytes());
        let tail = &rest[pos + 1..];
        match hex_prefix(tail, 2) {
            Some(byte) => {
                bytes.push(byte as u8);
                rest = &tail[2..];
            }
            None => {
                bytes.push(b'%');
                rest = tail;
            }
        }
    }
    bytes.extend_from_slice(rest.as_bytes());
    OsString::from_vec(bytes)
}

#[cfg(windows)]
fn encode_component(part: &OsStr) -> String {
    use std::os::windows::ffi::OsStrExt;

    let mut out = String::with_capacity(part.len());
    for unit in char::decode_utf16(part.encode_wide()) {
        match unit {
            Ok(c) => push_escaped(&mut out, c),
            Err(e) => out.push_str(&format!("%u{:04X}", e.unpaired_surrogate())),
        }
    }
    out
}

#[cfg(windows)]
fn decode_component(encoded: &str) -> OsString {
    use std::os::windows::ffi::OsStringExt;

    let mut wide: Vec<u16> = Vec::with_capacity(encoded.len());
    let mut rest = encoded;
    while let Some(pos) = rest.find('%') {
        wide.extend(rest[..pos].encode_utf16());
        let tail = &rest[pos + 1..];
        if let Some(unit) = tail.strip_prefix('u').and_then(|t| hex_prefix(t, 4)) {
            wide.push(unit as u16);
            rest = &tail[5..];
        } else if let Some(byte) = hex_prefix(tail, 2) {
            wide.push(byte as u16);
            rest = &tail[2..];
        } else {
            wide.push(u16::from(b'%'));
            rest = tail;
        }
    }
    wide.extend(rest.encode_utf16());
    OsString::from_wide(&wide)
}

fn clean(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if out.file_name().is_some() {
                    out.pop();
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

impl AsRef<Path> for NormalizedPath {
    fn as_ref(&self) -> &Path {
        &self.inner
    }
}

impl std::fmt::Display for NormalizedPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.inner.display())
    }
}

impl From<&str> for NormalizedPath {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for NormalizedPath {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<PathBuf> for NormalizedPath {
    fn from(p: PathBuf) -> Self {
        Self::new(p)
    }
}

impl From<&Path> for NormalizedPath {
    fn from(p: &Path) -> Self {
        Self::new(p)
    }
}

impl From<NormalizedPath> for PathBuf {
    fn from(p: NormalizedPath) -> Self {
        p.inner
    }
}
