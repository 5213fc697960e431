//! Retention and timeout settings

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Which snapshots survive pruning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionPolicy {
    /// Snapshots older than this many whole days are eligible for deletion
    #[serde(default = "default_days")]
    pub days: u32,

    /// Age-based deletion never drops the live count below this
    #[serde(default = "default_min_versions")]
    pub min_versions: u32,

    /// Hard cap on live snapshots (0 = unbounded); overrides `min_versions`
    #[serde(default)]
    pub max_versions: u32,
}

fn default_days() -> u32 {
    30
}

fn default_min_versions() -> u32 {
    3
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            days: default_days(),
            min_versions: default_min_versions(),
            max_versions: 0,
        }
    }
}

impl RetentionPolicy {
    /// True when both bounds are set and contradict each other
    pub fn has_conflict(&self) -> bool {
        self.max_versions > 0 && self.min_versions > self.max_versions
    }
}

/// Per-call limits for external operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timeouts {
    #[serde(default = "default_stop_secs")]
    pub stop_secs: u64,

    #[serde(default = "default_start_secs")]
    pub start_secs: u64,

    /// Deadline for writing a single archive
    #[serde(default = "default_archive_secs")]
    pub archive_secs: u64,
}

fn default_stop_secs() -> u64 {
    120
}

fn default_start_secs() -> u64 {
    120
}

fn default_archive_secs() -> u64 {
    3600
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            stop_secs: default_stop_secs(),
            start_secs: default_start_secs(),
            archive_secs: default_archive_secs(),
        }
    }
}

impl Timeouts {
    pub fn stop(&self) -> Duration {
        Duration::from_secs(self.stop_secs)
    }

    pub fn start(&self) -> Duration {
        Duration::from_secs(self.start_secs)
    }

    pub fn archive(&self) -> Duration {
        Duration::from_secs(self.archive_secs)
    }
}
