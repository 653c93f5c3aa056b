//! Per-invocation context
//!
//! Resolves the configuration and the registry location once so every
//! command works against the same data.

use mirror_core::{Config, Registry};
use std::path::Path;
use std::sync::Arc;

use crate::error::Result;

/// Configuration plus the registry it points at
#[derive(Debug)]
pub struct Context {
    pub config: Config,
    pub registry: Arc<Registry>,
}

impl Context {
    /// Load the user configuration and open the registry.
    ///
    /// An explicit `registry` path wins over the config file, which wins
    /// over the per-user default location.
    pub fn load(registry: Option<&Path>) -> Result<Self> {
        let mut config = Config::load()?;
        if let Some(path) = registry {
            config.registry_path = Some(path.to_path_buf());
        }
        let registry = Arc::new(Registry::open_with_config(&config)?);
        tracing::debug!(path = %registry.path().display(), "Using registry");
        Ok(Self { config, registry })
    }
}
