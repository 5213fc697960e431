//! Configuration file discovery
//!
//! ## Resolution Order
//!
//! 1. An explicit path (the `--config` flag)
//! 2. `COLDSNAP_CONFIG` environment variable (if set)
//! 3. `config.json` in the current directory

use std::path::{Path, PathBuf};

/// Environment variable naming the configuration file
pub const CONFIG_ENV_VAR: &str = "COLDSNAP_CONFIG";

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = "config.json";

/// Locates the configuration file used by coldsnap
#[derive(Debug, Clone)]
pub struct ColdsnapPaths {
    config_file: PathBuf,
}

impl ColdsnapPaths {
    /// Resolve the configuration file, honoring an explicit override first
    pub fn resolve(explicit: Option<PathBuf>) -> Self {
        let config_file = explicit
            .or_else(|| std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

        Self { config_file }
    }

    /// Use a fixed configuration file (useful for testing)
    pub fn with_config_file(config_file: impl Into<PathBuf>) -> Self {
        Self {
            config_file: config_file.into(),
        }
    }

    /// Path to the configuration file
    pub fn config_file(&self) -> &Path {
        &self.config_file
    }
}
