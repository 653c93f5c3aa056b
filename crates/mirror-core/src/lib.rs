//! Core engine for hardlink-mirror
//!
//! This crate keeps sets of folders ("mirror groups") content-identical by
//! sharing file data through hardlinks:
//!
//! - **Registry**: persisted catalog of groups plus per-folder markers
//! - **Discovery**: marker rescan, content fingerprinting and
//!   hardlink-adjacency scans that populate the registry
//! - **SyncEngine**: manifest-driven reconciliation and delete propagation
//! - **MirrorWatcher**: debounced filesystem watcher driving incremental sync
//!
//! # Architecture
//!
//! `mirror-core` sits above `mirror-fs` and below the CLI:
//!
//! ```text
//!                  mirror-cli
//!                      |
//!                 mirror-core
//!      +--------+------+------+---------+
//!      |        |             |         |
//!  registry  discovery      sync     watcher
//!      |        |             |         |
//!      +--------+---- mirror-fs --------+
//! ```
//!
//! # Example
//!
//! ```no_run
//! use mirror_core::{Registry, SyncEngine};
//!
//! fn example() -> mirror_core::Result<()> {
//!     let registry = Registry::open("/tmp/mirror_groups.json");
//!     let group = registry.create_group(["/data/photos", "/backup/photos"], None, true)?;
//!     let report = SyncEngine::for_registry(&registry).sync_group(&group)?;
//!     println!("{}", report.summary());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod discovery;
pub mod error;
pub mod group;
pub mod manifest;
pub mod marker;
pub mod registry;
pub mod sync;
pub mod watcher;

pub use config::Config;
pub use discovery::{ContentScanResult, Discovery, FingerprintScan, Progress, UnionFind, fingerprint_dir};
pub use error::{Error, Result};
pub use group::{MIN_SYNC_FOLDERS, MirrorGroup};
pub use manifest::{ManifestStore, SyncManifest};
pub use marker::{MARKER_FILE_NAME, has_marker, read_marker, remove_marker, write_marker};
pub use registry::{GroupUpdate, Registry};
pub use sync::{SyncEngine, SyncReport};
pub use watcher::{MirrorWatcher, RawEvent, RawEventKind};
