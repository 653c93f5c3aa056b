//! Hardlink reconciliation for mirror groups
//!
//! - **engine**: incremental and full-group sync, delete propagation
//! - **inventory**: per-folder snapshot of files and folder symlinks
//! - **report**: what a full pass changed

mod engine;
mod inventory;
mod report;

pub use engine::SyncEngine;
pub use report::SyncReport;
