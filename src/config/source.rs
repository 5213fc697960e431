//! Configuration sources
//!
//! The pipeline consumes configuration through [`ConfigSource`], which also
//! hands back the raw text so a verbatim copy can be stored with each
//! snapshot.

use std::fs;
use std::path::PathBuf;

use super::paths::ColdsnapPaths;
use super::settings::{BackupConfig, ConfigFormat};
use crate::error::{ColdsnapError, ColdsnapResult};

/// A parsed configuration plus the exact text it came from
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Validated configuration
    pub config: BackupConfig,
    /// Raw bytes as read from the source
    pub raw: Vec<u8>,
    /// File name used for the verbatim copy inside a snapshot
    pub file_name: String,
}

/// Anything that can produce a validated configuration
pub trait ConfigSource {
    /// Load and validate the configuration
    fn load(&self) -> ColdsnapResult<LoadedConfig>;
}

/// Reads configuration from a JSON or YAML file
#[derive(Debug, Clone)]
pub struct FileConfigSource {
    path: PathBuf,
}

impl FileConfigSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Source for the file resolved by [`ColdsnapPaths`]
    pub fn from_paths(paths: &ColdsnapPaths) -> Self {
        Self::new(paths.config_file())
    }
}

impl ConfigSource for FileConfigSource {
    fn load(&self) -> ColdsnapResult<LoadedConfig> {
        let raw = fs::read(&self.path).map_err(|e| {
            ColdsnapError::Config(format!(
                "Failed to read configuration file {}: {}",
                self.path.display(),
                e
            ))
        })?;

        let text = std::str::from_utf8(&raw).map_err(|e| {
            ColdsnapError::Config(format!(
                "Configuration file {} is not valid UTF-8: {}",
                self.path.display(),
                e
            ))
        })?;

        let format = ConfigFormat::from_path(&self.path);
        let config = BackupConfig::parse(text, format)?;

        let file_name = match format {
            ConfigFormat::Json => "config.json",
            ConfigFormat::Yaml => "config.yaml",
        }
        .to_string();

        Ok(LoadedConfig {
            config,
            raw,
            file_name,
        })
    }
}
