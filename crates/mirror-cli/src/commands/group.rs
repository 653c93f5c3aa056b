//! Group management commands

use colored::Colorize;
use dialoguer::Confirm;
use mirror_core::{GroupUpdate, MirrorGroup};

use super::print_group_line;
use crate::cli::GroupAction;
use crate::context::Context;
use crate::error::{CliError, Result};

/// Run a `mirror group` action
pub fn run_group(ctx: &Context, action: GroupAction) -> Result<()> {
    let registry = &ctx.registry;
    match action {
        GroupAction::Create {
            folders,
            name,
            no_auto_sync,
        } => {
            for folder in &folders {
                if !folder.is_dir() {
                    return Err(CliError::user(format!(
                        "Not a directory: {}",
                        folder.display()
                    )));
                }
            }
            let group = registry.create_group(&folders, name.as_deref(), !no_auto_sync)?;
            println!("{} Created group {}", "OK".green().bold(), group.name.cyan());
            print_details(&group);
            if !group.is_syncable() {
                warn_unsyncable();
            }
        }
        GroupAction::List { json } => {
            let groups = registry.list_groups();
            if json {
                println!("{}", serde_json::to_string_pretty(&groups)?);
            } else if groups.is_empty() {
                println!("No mirror groups registered.");
            } else {
                println!("{}", "Mirror Groups".bold());
                for group in &groups {
                    print_group_line(group);
                }
            }
        }
        GroupAction::Show { id } => {
            let group = find(ctx, &id)?;
            print_details(&group);
        }
        GroupAction::Delete { id } => {
            if !registry.delete_group(&id)? {
                return Err(not_found(&id));
            }
            println!("{} Deleted group {} (files were kept)", "OK".green().bold(), id);
        }
        GroupAction::AddFolder { id, folder } => {
            if !folder.is_dir() {
                return Err(CliError::user(format!("Not a directory: {}", folder.display())));
            }
            let group = registry.add_folder(&id, &folder)?;
            println!(
                "{} {} now has {} folders",
                "OK".green().bold(),
                group.name.cyan(),
                group.folders.len()
            );
        }
        GroupAction::RemoveFolder { id, folder } => {
            if !registry.remove_folder(&id, &folder)? {
                return Err(CliError::user(format!(
                    "{} is not a member of group {}",
                    folder.display(),
                    id
                )));
            }
            println!("{} Removed {}", "OK".green().bold(), folder.display());
            if let Some(group) = registry.get_group(&id)
                && !group.is_syncable()
            {
                warn_unsyncable();
            }
        }
        GroupAction::Rename { id, name } => {
            let group = registry.update_group(
                &id,
                GroupUpdate {
                    name: Some(name),
                    ..Default::default()
                },
            )?;
            println!("{} Renamed to {}", "OK".green().bold(), group.name.cyan());
        }
        GroupAction::AutoSync { id, state } => {
            let group = registry.update_group(
                &id,
                GroupUpdate {
                    auto_sync: Some(state.into()),
                    ..Default::default()
                },
            )?;
            let label = if group.auto_sync { "on" } else { "off" };
            println!("{} Auto-sync {} for {}", "OK".green().bold(), label, group.name.cyan());
        }
        GroupAction::Clear { yes } => {
            let count = registry.list_groups().len();
            if count == 0 {
                println!("No mirror groups registered.");
                return Ok(());
            }
            let proceed = yes
                || Confirm::new()
                    .with_prompt(format!("Unregister all {count} groups? Files are kept."))
                    .default(false)
                    .interact()?;
            if !proceed {
                return Err(CliError::user("Clear cancelled by user."));
            }
            let removed = registry.clear_all_groups()?;
            println!("{} Unregistered {} groups", "OK".green().bold(), removed);
        }
    }
    Ok(())
}

pub(crate) fn find(ctx: &Context, id: &str) -> Result<MirrorGroup> {
    ctx.registry.get_group(id).ok_or_else(|| not_found(id))
}

fn not_found(id: &str) -> CliError {
    CliError::Core(mirror_core::Error::GroupNotFound { id: id.to_string() })
}

fn warn_unsyncable() {
    eprintln!(
        "{} groups need at least {} folders to sync",
        "warning:".yellow().bold(),
        mirror_core::MIN_SYNC_FOLDERS
    );
}

fn print_details(group: &MirrorGroup) {
    println!("  {:<10} {}", "id".dimmed(), group.id);
    println!("  {:<10} {}", "name".dimmed(), group.name);
    println!("  {:<10} {}", "auto-sync".dimmed(), group.auto_sync);
    println!("  {:<10} {}", "created".dimmed(), group.created_at.to_rfc3339());
    println!("  {:<10} {}", "modified".dimmed(), group.modified_at.to_rfc3339());
    println!("  {}", "folders".dimmed());
    for folder in &group.folders {
        let state = if folder.is_dir() {
            String::new()
        } else {
            format!(" {}", "(missing)".red())
        };
        println!("    {}{}", folder, state);
    }
}
