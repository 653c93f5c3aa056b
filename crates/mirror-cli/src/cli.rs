//! CLI argument parsing using clap derive

use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;

/// Hardlink Mirror - keep folders in sync through hardlinks
#[derive(Parser, Debug)]
#[command(name = "mirror")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Registry file to use instead of the per-user default
    #[arg(long, global = true, env = "MIRROR_REGISTRY")]
    pub registry: Option<PathBuf>,

    /// The command to run
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Manage mirror groups
    Group {
        #[command(subcommand)]
        action: GroupAction,
    },

    /// Reconcile a group so every folder holds the same entries
    ///
    /// Examples:
    ///   mirror sync 3f2a...        # Sync one group
    ///   mirror sync --all          # Sync every group
    Sync {
        /// Group id to sync
        #[arg(required_unless_present = "all", conflicts_with = "all")]
        group_id: Option<String>,

        /// Sync every registered group
        #[arg(long)]
        all: bool,

        /// Output the reports as JSON
        #[arg(long)]
        json: bool,
    },

    /// Discover mirror groups on disk
    Scan {
        #[command(subcommand)]
        action: ScanAction,
    },

    /// Create, delete and inspect individual hardlinks
    Link {
        #[command(subcommand)]
        action: LinkAction,
    },

    /// Watch auto-sync groups and mirror changes until Enter is pressed
    Watch,

    /// Generate shell completions
    ///
    /// Examples:
    ///   mirror completions bash > ~/.local/share/bash-completion/completions/mirror
    ///   mirror completions zsh > ~/.zfunc/_mirror
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Group management actions
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum GroupAction {
    /// Register a new group
    Create {
        /// Member folders
        #[arg(required = true)]
        folders: Vec<PathBuf>,

        /// Display name (derived from the folder names when omitted)
        #[arg(short, long)]
        name: Option<String>,

        /// Leave the group out of the watcher
        #[arg(long)]
        no_auto_sync: bool,
    },

    /// List registered groups
    List {
        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// Show one group
    Show {
        id: String,
    },

    /// Unregister a group (member files are kept)
    Delete {
        id: String,
    },

    /// Add a folder to a group
    AddFolder {
        id: String,
        folder: PathBuf,
    },

    /// Remove a folder from a group
    RemoveFolder {
        id: String,
        folder: PathBuf,
    },

    /// Rename a group
    Rename {
        id: String,
        name: String,
    },

    /// Turn watcher syncing on or off for a group
    AutoSync {
        id: String,
        #[arg(value_enum)]
        state: Toggle,
    },

    /// Unregister every group
    Clear {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

/// Discovery scans
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ScanAction {
    /// Rebuild groups from the markers left in member folders
    Quick {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Find folders whose contents are byte-identical
    Content {
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Register every candidate without asking
        #[arg(short, long)]
        yes: bool,
    },

    /// Group the given folders by the hardlinks they share
    Links {
        #[arg(required = true)]
        folders: Vec<PathBuf>,
    },
}

/// Single-link actions
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum LinkAction {
    /// Hardlink a file into a directory
    Create {
        source: PathBuf,
        dest_dir: PathBuf,

        /// Name of the new link (defaults to the source name)
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Delete one link
    Delete {
        path: PathBuf,

        /// Also delete the matching copies in the other folders of its group
        #[arg(long)]
        everywhere: bool,

        /// Delete even when this is the last link to the data
        #[arg(short, long)]
        yes: bool,
    },

    /// Find every link to a file under the given directories
    Find {
        path: PathBuf,
        #[arg(required = true)]
        search_dirs: Vec<PathBuf>,
    },

    /// Show link count, identity and group membership of a path
    Info {
        path: PathBuf,

        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    On,
    Off,
}

impl From<Toggle> for bool {
    fn from(toggle: Toggle) -> Self {
        toggle == Toggle::On
    }
}
