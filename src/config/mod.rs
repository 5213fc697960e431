//! Configuration module for coldsnap
//!
//! This module provides configuration management including:
//! - Configuration file discovery
//! - JSON/YAML parsing and validation
//! - The `ConfigSource` seam consumed by the pipeline

pub mod paths;
pub mod settings;
pub mod source;

pub use paths::ColdsnapPaths;
pub use settings::{BackupConfig, ConfigFormat};
pub use source::{ConfigSource, FileConfigSource, LoadedConfig};
