//! Watch command implementation

use std::sync::Arc;

use colored::Colorize;
use mirror_core::MirrorWatcher;

use crate::context::Context;
use crate::error::{CliError, Result};

/// Run the watcher in the foreground until Enter is pressed
pub fn run_watch(ctx: &Context) -> Result<()> {
    let mut watcher = MirrorWatcher::new(Arc::clone(&ctx.registry))
        .with_debounce(ctx.config.debounce())
        .on_sync(|source, created| {
            println!(
                "{} {} -> {} links",
                "+".green(),
                source.display(),
                created.len()
            );
        })
        .on_delete(|source, deleted| {
            println!(
                "{} {} -> {} copies removed",
                "-".red(),
                source.display(),
                deleted.len()
            );
        })
        .on_status(|message| tracing::info!("{message}"));

    watcher.start()?;
    let watched = watcher.watched_folders().len();
    if watched == 0 {
        watcher.stop();
        return Err(CliError::user(
            "No auto-sync groups to watch. Enable one with 'mirror group auto-sync <id> on'.",
        ));
    }

    println!(
        "{} Watching {} folders. Press Enter to stop.",
        "=>".blue().bold(),
        watched
    );
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;

    watcher.stop();
    println!("{} Watcher stopped.", "OK".green().bold());
    Ok(())
}
