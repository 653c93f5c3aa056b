//! Mirror group record
//!
//! A mirror group is a named set of folders kept content-identical through
//! hardlinks. Groups with fewer than two folders are allowed to exist while
//! being edited, but every sync operation treats them as a no-op.

use chrono::{DateTime, NaiveDateTime, Utc};
use mirror_fs::NormalizedPath;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;
use uuid::Uuid;

/// Minimum number of folders for a group to be synchronizable.
pub const MIN_SYNC_FOLDERS: usize = 2;

/// A set of folders mirrored through hardlinks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MirrorGroup {
    /// Opaque unique id, generated once
    #[serde(default = "new_group_id")]
    pub id: String,
    /// Display name, user supplied or derived from the folder names
    #[serde(default)]
    pub name: String,
    /// Member folders, in the order they were added
    #[serde(default)]
    pub folders: Vec<NormalizedPath>,
    /// Whether the watcher keeps this group in sync automatically
    #[serde(default = "default_auto_sync", rename = "sync_enabled", alias = "auto_sync")]
    pub auto_sync: bool,
    #[serde(default = "Utc::now", deserialize_with = "lenient_timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now", deserialize_with = "lenient_timestamp")]
    pub modified_at: DateTime<Utc>,
}

fn new_group_id() -> String {
    Uuid::new_v4().to_string()
}

fn default_auto_sync() -> bool {
    true
}

/// Accept any timestamp value. RFC 3339 and zone-less ISO 8601 (taken as
/// UTC) are parsed; anything else, including `""` and `null`, becomes now
/// so that a bad timestamp never costs the whole record.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value
        .as_str()
        .map(str::trim)
        .and_then(parse_timestamp)
        .unwrap_or_else(Utc::now))
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .or_else(|_| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").map(|t| t.and_utc())
        })
        .ok()
}

impl MirrorGroup {
    /// Create a group with a fresh id.
    ///
    /// Folders are normalized and duplicates dropped, keeping the first
    /// occurrence. An empty or missing `name` is derived from the folders.
    pub fn new<P: AsRef<Path>>(
        folders: impl IntoIterator<Item = P>,
        name: Option<&str>,
        auto_sync: bool,
    ) -> Self {
        Self::with_id(new_group_id(), folders, name, auto_sync)
    }

    /// Create a group with a specific id (used when reconstructing a group
    /// from folder markers).
    pub fn with_id<P: AsRef<Path>>(
        id: impl Into<String>,
        folders: impl IntoIterator<Item = P>,
        name: Option<&str>,
        auto_sync: bool,
    ) -> Self {
        let now = Utc::now();
        let mut group = Self {
            id: id.into(),
            name: String::new(),
            folders: dedup_folders(folders),
            auto_sync,
            created_at: now,
            modified_at: now,
        };
        group.name = match name.map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => group.auto_name(),
        };
        group
    }

    /// Name derived from the folder base names, e.g. `Photos + Backup`.
    pub fn auto_name(&self) -> String {
        if self.folders.is_empty() {
            return "(empty)".to_string();
        }
        self.folders
            .iter()
            .map(|f| {
                f.file_name()
                    .map(str::to_string)
                    .unwrap_or_else(|| f.to_string())
            })
            .collect::<Vec<_>>()
            .join(" + ")
    }

    /// Update the modified timestamp.
    pub fn touch(&mut self) {
        self.modified_at = Utc::now();
    }

    /// Replace the folder list, re-deriving the name.
    pub fn set_folders<P: AsRef<Path>>(&mut self, folders: impl IntoIterator<Item = P>) {
        self.folders = dedup_folders(folders);
        self.name = self.auto_name();
        self.touch();
    }

    pub fn contains_folder(&self, folder: &NormalizedPath) -> bool {
        self.folders.iter().any(|f| f == folder)
    }

    /// The member folder that `path` equals or lies beneath, if any.
    pub fn root_for(&self, path: &NormalizedPath) -> Option<&NormalizedPath> {
        self.folders.iter().find(|f| path.is_within(f))
    }

    /// True if the group has enough folders to be synchronized.
    pub fn is_syncable(&self) -> bool {
        self.folders.len() >= MIN_SYNC_FOLDERS
    }
}

fn dedup_folders<P: AsRef<Path>>(folders: impl IntoIterator<Item = P>) -> Vec<NormalizedPath> {
    let mut out: Vec<NormalizedPath> = Vec::new();
    for folder in folders {
        let folder = NormalizedPath::new(folder);
        if !out.contains(&folder) {
            out.push(folder);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_name_joins_base_names() {
        let group = MirrorGroup::new(["/data/Photos", "/backup/Backup"], None, true);
        assert_eq!(group.name, "Photos + Backup");
    }

    #[test]
    fn explicit_name_is_kept() {
        let group = MirrorGroup::new(["/a", "/b"], Some("Family"), true);
        assert_eq!(group.name, "Family");
    }

    #[test]
    fn duplicate_folders_collapse() {
        let group = MirrorGroup::new(["/a", "/a/", "/b", "/a/./"], None, true);
        assert_eq!(group.folders.len(), 2);
        assert_eq!(group.name, "a + b");
    }

    #[test]
    fn root_for_matches_nested_paths_only() {
        let group = MirrorGroup::new(["/m/p", "/m/q"], None, true);

        let nested = NormalizedPath::new("/m/q/notes/x.txt");
        assert_eq!(group.root_for(&nested), Some(&NormalizedPath::new("/m/q")));
        assert_eq!(group.root_for(&NormalizedPath::new("/m/pq/x")), None);
    }

    #[test]
    fn set_folders_renames_and_touches() {
        let mut group = MirrorGroup::new(["/a", "/b"], Some("custom"), true);
        let before = group.modified_at;

        group.set_folders(["/a", "/b", "/c"]);

        assert_eq!(group.name, "a + b + c");
        assert!(group.modified_at >= before);
    }

    #[test]
    fn deserializes_with_missing_fields_and_unknown_keys() {
        let json = r#"{"id": "g1", "folders": ["/a", "/b/"], "future_field": 7}"#;
        let group: MirrorGroup = serde_json::from_str(json).unwrap();

        assert_eq!(group.id, "g1");
        assert!(group.auto_sync);
        assert_eq!(group.folders[1], NormalizedPath::new("/b"));
    }

    #[test]
    fn bad_timestamps_do_not_reject_the_record() {
        let json = r#"{"id": "g1", "folders": ["/a", "/b"],
            "created_at": "", "modified_at": 1700000000}"#;
        let group: MirrorGroup = serde_json::from_str(json).unwrap();
        assert_eq!(group.id, "g1");

        let json = r#"{"id": "g2", "created_at": "2024-03-01T10:00:00+00:00",
            "modified_at": "2024-03-02T11:30:00.250"}"#;
        let group: MirrorGroup = serde_json::from_str(json).unwrap();
        assert_eq!(group.created_at.to_rfc3339(), "2024-03-01T10:00:00+00:00");
        assert_eq!(group.modified_at.timestamp_millis() % 1000, 250);
    }

    #[test]
    fn serializes_auto_sync_as_sync_enabled() {
        let group = MirrorGroup::new(["/a", "/b"], None, false);
        let value = serde_json::to_value(&group).unwrap();
        assert_eq!(value["sync_enabled"], false);
        assert!(value["created_at"].as_str().unwrap().contains('T'));
    }
}
