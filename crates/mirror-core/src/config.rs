//! User configuration and data locations
//!
//! Everything lives under one per-user directory so the data survives
//! relaunches of a single-binary build from a temporary extraction dir:
//! - Linux: `~/.config/hardlink-mirror/`
//! - macOS: `~/Library/Application Support/hardlink-mirror/`
//! - Windows: `%APPDATA%\hardlink-mirror\`

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const APP_DIR_NAME: &str = "hardlink-mirror";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const REGISTRY_FILE_NAME: &str = "mirror_groups.json";
pub const MANIFEST_DIR_NAME: &str = "manifests";

/// Tunables read from `config.toml`. Missing keys take their defaults and
/// unknown keys are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Use this registry file instead of the default location.
    pub registry_path: Option<PathBuf>,
    /// Quiet period before the watcher acts on a path.
    pub debounce_ms: u64,
    /// Directories between quick-scan progress reports.
    pub progress_interval: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            registry_path: None,
            debounce_ms: 500,
            progress_interval: 50,
        }
    }
}

impl Config {
    /// The platform-appropriate data directory, if the platform has one.
    pub fn default_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_DIR_NAME))
    }

    /// Load `config.toml` from the default directory.
    pub fn load() -> Result<Self> {
        match Self::default_dir() {
            Some(dir) => Self::load_from(&dir.join(CONFIG_FILE_NAME)),
            None => Ok(Self::default()),
        }
    }

    /// Load a config file; a missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = mirror_fs::io::read_text(path)?;
        toml::from_str(&content).map_err(|e| Error::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Where the registry file lives.
    pub fn registry_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.registry_path {
            return Ok(path.clone());
        }
        Self::default_dir()
            .map(|dir| dir.join(REGISTRY_FILE_NAME))
            .ok_or_else(|| Error::invalid("no per-user configuration directory on this platform"))
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}
