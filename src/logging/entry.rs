//! Run log entry data structures

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::pipeline::Phase;

/// Severity of a run log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    /// Progress information
    Info,
    /// A step completed successfully
    Ok,
    /// Non-fatal problem; the run continues
    Warn,
    /// Fatal problem; the run is aborted
    Error,
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Level::Info => write!(f, "INFO"),
            Level::Ok => write!(f, "OK"),
            Level::Warn => write!(f, "WARN"),
            Level::Error => write!(f, "ERROR"),
        }
    }
}

/// A single line of the per-run log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// When the entry was recorded (local time, matching snapshot ids)
    pub timestamp: DateTime<Local>,

    pub level: Level,

    /// Pipeline phase the entry belongs to, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<Phase>,

    pub message: String,
}

impl LogEntry {
    pub fn new(level: Level, phase: Option<Phase>, message: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now(),
            level,
            phase,
            message: message.into(),
        }
    }
}
