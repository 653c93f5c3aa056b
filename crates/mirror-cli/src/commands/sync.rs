//! Sync command implementation

use colored::Colorize;
use mirror_core::{MirrorGroup, SyncEngine, SyncReport};
use serde::Serialize;

use super::group::find;
use crate::context::Context;
use crate::error::{CliError, Result};

/// One group's outcome in `--json` output
#[derive(Debug, Serialize)]
struct GroupSyncOutput<'a> {
    id: &'a str,
    name: &'a str,
    #[serde(flatten)]
    report: &'a SyncReport,
}

/// Run the sync command for one group or all of them
pub fn run_sync(ctx: &Context, group_id: Option<&str>, all: bool, json: bool) -> Result<()> {
    let groups = match group_id {
        Some(id) if !all => vec![find(ctx, id)?],
        _ => ctx.registry.list_groups(),
    };

    let engine = SyncEngine::for_registry(&ctx.registry);
    let mut results: Vec<(MirrorGroup, SyncReport)> = Vec::with_capacity(groups.len());
    for group in groups {
        if !group.is_syncable() {
            if !json {
                println!(
                    "{} {} has fewer than {} folders, skipped",
                    "SKIP".yellow().bold(),
                    group.name,
                    mirror_core::MIN_SYNC_FOLDERS
                );
            }
            continue;
        }
        if !json {
            println!("{} Syncing {}...", "=>".blue().bold(), group.name.cyan());
        }
        let report = engine.sync_group(&group)?;
        if !json {
            print_report(&report);
        }
        results.push((group, report));
    }

    if json {
        let output: Vec<_> = results
            .iter()
            .map(|(group, report)| GroupSyncOutput {
                id: &group.id,
                name: &group.name,
                report,
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&output)?);
    }

    if results.iter().any(|(_, report)| report.has_errors()) {
        return Err(CliError::user("Some entries could not be synced."));
    }
    Ok(())
}

fn print_report(report: &SyncReport) {
    if report.is_noop() && report.collisions.is_empty() && !report.has_errors() {
        println!("   {} Already in sync.", "OK".green().bold());
        return;
    }
    for dest in report.created.keys() {
        println!("   {} {}", "+".green(), dest.display());
    }
    for path in &report.deleted {
        println!("   {} {}", "-".red(), path.display());
    }
    for path in &report.collisions {
        println!("   {} {} (name taken by an unrelated entry)", "!".yellow(), path.display());
    }
    for error in &report.errors {
        println!("   {} {}", "x".red().bold(), error);
    }
    println!("   {}", report.summary());
}
