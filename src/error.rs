//! Custom error types for coldsnap
//!
//! This module defines the error hierarchy for the backup pipeline using
//! thiserror. Each pipeline phase has its own variant so callers can decide
//! whether a failure aborts the run or is only reported as a warning.

use std::path::PathBuf;

use thiserror::Error;

/// Failures raised while producing a single archive
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// The configured source path does not exist
    #[error("source does not exist: {}", .0.display())]
    SourceMissing(PathBuf),

    /// The source vanished or could not be read mid-archive
    #[error("failed to read {}: {reason}", .path.display())]
    SourceRead { path: PathBuf, reason: String },

    /// The destination archive could not be written or finalized
    #[error("failed to write {}: {reason}", .path.display())]
    DestinationWrite { path: PathBuf, reason: String },

    /// The archive did not finish within its deadline
    #[error("archiving {} timed out after {secs}s", .path.display())]
    TimedOut { path: PathBuf, secs: u64 },

    /// Zip encoder errors
    #[error("zip error: {0}")]
    Zip(String),
}

impl ArchiveError {
    /// A missing source is a warning, everything else aborts the run
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::SourceMissing(_))
    }
}

impl From<zip::result::ZipError> for ArchiveError {
    fn from(err: zip::result::ZipError) -> Self {
        Self::Zip(err.to_string())
    }
}

/// The main error type for coldsnap operations
#[derive(Error, Debug)]
pub enum ColdsnapError {
    /// Unreadable or malformed configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// A workload could not be stopped
    #[error("Failed to stop workload '{workload}': {reason}")]
    Quiesce { workload: String, reason: String },

    /// Archive production failed
    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),

    /// A workload could not be started again
    #[error("Failed to restart workload '{workload}': {reason}")]
    Restart { workload: String, reason: String },

    /// A snapshot could not be deleted
    #[error("Failed to prune snapshot '{snapshot}': {reason}")]
    Prune { snapshot: String, reason: String },

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(String),

    /// YAML serialization/deserialization errors
    #[error("YAML error: {0}")]
    Yaml(String),

    /// Entity not found errors
    #[error("{entity_type} not found: {identifier}")]
    NotFound {
        entity_type: &'static str,
        identifier: String,
    },
}

impl ColdsnapError {
    /// Create a "not found" error for snapshots
    pub fn snapshot_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: "Snapshot",
            identifier: identifier.into(),
        }
    }

    /// Whether this error ends the run.
    ///
    /// Restart and prune failures are only ever warnings.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Restart { .. } | Self::Prune { .. } => false,
            Self::Archive(err) => err.is_fatal(),
            _ => true,
        }
    }

    /// Check if this is a configuration error
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

impl From<std::io::Error> for ColdsnapError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for ColdsnapError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

impl From<serde_yaml::Error> for ColdsnapError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Yaml(err.to_string())
    }
}

/// Result type alias for coldsnap operations
pub type ColdsnapResult<T> = Result<T, ColdsnapError>;
