//! Hardlink Mirror CLI
//!
//! The command-line interface for managing mirror groups.

mod cli;
mod commands;
mod context;
mod error;

use clap::{CommandFactory, Parser};
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use context::Context;
use error::Result;

fn main() {
    if let Err(e) = run() {
        eprintln!("{}: {}", "error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let Some(command) = cli.command else {
        println!("{} Hardlink Mirror CLI", "mirror".green().bold());
        println!();
        println!("Run {} for available commands.", "mirror --help".cyan());
        return Ok(());
    };

    if let Commands::Completions { shell } = command {
        clap_complete::generate(shell, &mut Cli::command(), "mirror", &mut std::io::stdout());
        return Ok(());
    }

    let ctx = Context::load(cli.registry.as_deref())?;
    execute_command(&ctx, command)
}

/// `RUST_LOG` wins; otherwise warnings only, or debug with `--verbose`.
fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbose)
        .with_writer(std::io::stderr)
        .try_init();
}

fn execute_command(ctx: &Context, cmd: Commands) -> Result<()> {
    match cmd {
        Commands::Group { action } => commands::run_group(ctx, action),
        Commands::Sync {
            group_id,
            all,
            json,
        } => commands::run_sync(ctx, group_id.as_deref(), all, json),
        Commands::Scan { action } => commands::run_scan(ctx, action),
        Commands::Link { action } => commands::run_link(ctx, action),
        Commands::Watch => commands::run_watch(ctx),
        Commands::Completions { .. } => Ok(()),
    }
}
