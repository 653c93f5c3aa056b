//! Discovery scan commands

use std::io::Write;

use colored::Colorize;
use dialoguer::Confirm;
use mirror_core::{Discovery, MirrorGroup};
use mirror_fs::NormalizedPath;

use super::print_group_line;
use crate::cli::ScanAction;
use crate::context::Context;
use crate::error::Result;

/// Run a `mirror scan` action
pub fn run_scan(ctx: &Context, action: ScanAction) -> Result<()> {
    let discovery =
        Discovery::new(&ctx.registry).with_progress_interval(ctx.config.progress_interval);

    match action {
        ScanAction::Quick { paths } => {
            println!("{} Looking for mirror markers...", "=>".blue().bold());
            let mut progress = progress_printer("directories", "markers");
            let created = discovery.quick_scan(&paths, Some(&mut progress))?;
            end_progress();
            print_created(&created);
        }
        ScanAction::Content { paths, yes } => {
            println!("{} Fingerprinting folder contents...", "=>".blue().bold());
            let mut progress = progress_printer("directories", "files");
            let result = discovery.scan_content_mirrors(&paths, Some(&mut progress))?;
            end_progress();

            if result.is_empty() {
                println!("No identical folders found.");
                return Ok(());
            }

            // Sets whose folders already carry one group's marker need no confirmation
            let mut created = discovery.register_folder_sets(&result.auto_confirmed)?;

            let mut accepted = Vec::new();
            for (i, set) in result.candidates.iter().enumerate() {
                println!();
                println!(
                    "{} Candidate {} of {}:",
                    "?".yellow().bold(),
                    i + 1,
                    result.candidates.len()
                );
                print_folders(set);
                let keep = yes
                    || Confirm::new()
                        .with_prompt("Register these folders as a mirror group?")
                        .default(true)
                        .interact()?;
                if keep {
                    accepted.push(set.clone());
                }
            }
            created.extend(discovery.register_folder_sets(&accepted)?);
            print_created(&created);
        }
        ScanAction::Links { folders } => {
            println!("{} Comparing hardlinks between folders...", "=>".blue().bold());
            let created = discovery.scan_hardlink_mirrors(&folders)?;
            print_created(&created);
        }
    }
    Ok(())
}

/// Progress callback that rewrites one status line on stderr.
fn progress_printer(done_label: &'static str, found_label: &'static str) -> impl FnMut(usize, usize) {
    move |done, found| {
        eprint!("\r   {done} {done_label}, {found} {found_label}");
        let _ = std::io::stderr().flush();
    }
}

fn end_progress() {
    eprintln!();
}

fn print_folders(folders: &[NormalizedPath]) {
    for folder in folders {
        println!("    {folder}");
    }
}

fn print_created(created: &[MirrorGroup]) {
    if created.is_empty() {
        println!("No new groups registered.");
        return;
    }
    println!("{} Registered {} groups:", "OK".green().bold(), created.len());
    for group in created {
        print_group_line(group);
    }
}
