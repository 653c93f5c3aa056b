//! Command implementations for mirror-cli

pub mod group;
pub mod link;
pub mod scan;
pub mod sync;
pub mod watch;

pub use group::run_group;
pub use link::run_link;
pub use scan::run_scan;
pub use sync::run_sync;
pub use watch::run_watch;

use colored::Colorize;
use mirror_core::MirrorGroup;

/// Print the one-line summary used by list and scan output.
pub(crate) fn print_group_line(group: &MirrorGroup) {
    let auto = if group.auto_sync {
        "auto".green()
    } else {
        "manual".yellow()
    };
    println!(
        "  {} {} [{}] ({} folders)",
        group.id.dimmed(),
        group.name.bold(),
        auto,
        group.folders.len()
    );
}
