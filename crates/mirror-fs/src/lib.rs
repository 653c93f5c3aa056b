//! File identity and hardlink primitives for hardlink-mirror
//!
//! Wraps the OS file-identity queries and the create/delete/enumerate
//! operations for hardlinks and folder symlinks, plus the normalized path
//! and atomic write helpers the rest of the workspace builds on.

pub mod checksum;
pub mod error;
pub mod identity;
pub mod io;
pub mod links;
pub mod path;
pub mod symlink;

pub use error::{Error, ErrorKind, Result};
pub use identity::{FileIdentity, identity, is_regular_file, is_same_volume, link_count};
pub use links::{create_hardlink, delete_hardlink, find_all_hardlinks, remove_entry};
pub use path::{NormalizedPath, from_relative_string, to_relative_string};
pub use symlink::{
    create_folder_symlink, create_symlink, delete_folder_symlink, is_folder_symlink, is_symlink,
    is_symlink_broken, read_symlink_target,
};
