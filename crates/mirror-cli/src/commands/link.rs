//! Single-link commands

use std::path::{Path, PathBuf};

use colored::Colorize;
use dialoguer::Confirm;
use mirror_core::SyncEngine;
use serde::Serialize;

use crate::cli::LinkAction;
use crate::context::Context;
use crate::error::{CliError, Result};

/// What `mirror link info` reports about a path
#[derive(Debug, Serialize)]
struct LinkInfo {
    path: PathBuf,
    kind: &'static str,
    identity: Option<String>,
    link_count: Option<u64>,
    symlink_target: Option<PathBuf>,
    broken: bool,
    group_id: Option<String>,
    group_name: Option<String>,
}

/// Run a `mirror link` action
pub fn run_link(ctx: &Context, action: LinkAction) -> Result<()> {
    match action {
        LinkAction::Create {
            source,
            dest_dir,
            name,
        } => create(&source, &dest_dir, name.as_deref()),
        LinkAction::Delete {
            path,
            everywhere,
            yes,
        } => delete(ctx, &path, everywhere, yes),
        LinkAction::Find { path, search_dirs } => {
            let links = mirror_fs::find_all_hardlinks(&path, &search_dirs)?;
            if links.is_empty() {
                println!("No links found under the given directories.");
            }
            for link in links {
                println!("{}", link.display());
            }
            Ok(())
        }
        LinkAction::Info { path, json } => {
            let info = inspect(ctx, &path)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&info)?);
            } else {
                print_info(&info);
            }
            Ok(())
        }
    }
}

fn create(source: &Path, dest_dir: &Path, name: Option<&str>) -> Result<()> {
    match mirror_fs::create_hardlink(source, dest_dir, name) {
        Ok(dest) => {
            println!("{} Linked {}", "OK".green().bold(), dest.display());
            Ok(())
        }
        Err(mirror_fs::Error::CrossVolume { source_path, dest }) => Err(CliError::user(format!(
            "Cannot hardlink across volumes: {} and {} are on different drives. \
             Hardlinks can only point at data on the same volume; copy the file instead.",
            source_path.display(),
            dest.display()
        ))),
        Err(e) => Err(e.into()),
    }
}

fn delete(ctx: &Context, path: &Path, everywhere: bool, yes: bool) -> Result<()> {
    let folder_link = mirror_fs::is_folder_symlink(path);

    if !folder_link && mirror_fs::link_count(path)? <= 1 && !everywhere {
        eprintln!(
            "{} {} is the last link to its data; deleting it removes the data for good.",
            "warning:".yellow().bold(),
            path.display()
        );
        let proceed = yes
            || Confirm::new()
                .with_prompt("Delete anyway?")
                .default(false)
                .interact()?;
        if !proceed {
            return Err(CliError::user("Delete cancelled by user."));
        }
    }

    if everywhere {
        let Some((group, _)) = ctx.registry.find_group_for_path(path) else {
            return Err(CliError::user(format!(
                "{} is not inside a mirror group",
                path.display()
            )));
        };
        if !yes {
            let proceed = Confirm::new()
                .with_prompt(format!(
                    "Delete every copy in the {} folders of {}?",
                    group.folders.len(),
                    group.name
                ))
                .default(false)
                .interact()?;
            if !proceed {
                return Err(CliError::user("Delete cancelled by user."));
            }
        }
        let deleted = SyncEngine::for_registry(&ctx.registry).delete_from_group(path, &group)?;
        for removed in &deleted {
            println!("   {} {}", "-".red(), removed.display());
        }
        println!("{} Deleted {} entries", "OK".green().bold(), deleted.len());
        return Ok(());
    }

    if folder_link {
        mirror_fs::delete_folder_symlink(path)?;
    } else {
        mirror_fs::delete_hardlink(path)?;
    }
    println!("{} Deleted {}", "OK".green().bold(), path.display());
    Ok(())
}

fn inspect(ctx: &Context, path: &Path) -> Result<LinkInfo> {
    let meta = std::fs::symlink_metadata(path).map_err(|e| mirror_fs::Error::io(path, e))?;
    let is_symlink = meta.file_type().is_symlink();
    let kind = if mirror_fs::is_folder_symlink(path) {
        "folder-symlink"
    } else if is_symlink {
        "symlink"
    } else if meta.is_dir() {
        "directory"
    } else {
        "file"
    };

    let group = ctx.registry.find_group_for_path(path).map(|(group, _)| group);
    let regular = mirror_fs::is_regular_file(path);
    Ok(LinkInfo {
        path: path.to_path_buf(),
        kind,
        identity: if regular {
            mirror_fs::identity(path).ok().map(|id| id.to_string())
        } else {
            None
        },
        link_count: if regular {
            mirror_fs::link_count(path).ok()
        } else {
            None
        },
        symlink_target: if is_symlink {
            mirror_fs::read_symlink_target(path).ok()
        } else {
            None
        },
        broken: is_symlink && mirror_fs::is_symlink_broken(path),
        group_id: group.as_ref().map(|g| g.id.clone()),
        group_name: group.map(|g| g.name),
    })
}

fn print_info(info: &LinkInfo) {
    println!("{}", info.path.display().to_string().bold());
    println!("  {:<10} {}", "kind".dimmed(), info.kind);
    if let Some(identity) = &info.identity {
        println!("  {:<10} {}", "identity".dimmed(), identity);
    }
    if let Some(count) = info.link_count {
        let count_text = if count <= 1 {
            count.to_string().yellow()
        } else {
            count.to_string().green()
        };
        println!("  {:<10} {}", "links".dimmed(), count_text);
    }
    if let Some(target) = &info.symlink_target {
        let state = if info.broken {
            format!(" {}", "(broken)".red())
        } else {
            String::new()
        };
        println!("  {:<10} {}{}", "target".dimmed(), target.display(), state);
    }
    match (&info.group_name, &info.group_id) {
        (Some(name), Some(id)) => println!("  {:<10} {} ({})", "group".dimmed(), name, id.dimmed()),
        _ => println!("  {:<10} {}", "group".dimmed(), "(none)".dimmed()),
    }
}
