//! Snapshot identity and contents
//!
//! A snapshot is one timestamped directory produced by a single pipeline
//! run. Its name is a fixed-width, lexically sortable timestamp with second
//! precision, e.g. `2025-03-14 021500`.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{Duration, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

/// Directory-name format for snapshot ids
pub const SNAPSHOT_ID_FORMAT: &str = "%Y-%m-%d %H%M%S";

/// Length of a formatted snapshot id
const SNAPSHOT_ID_LEN: usize = 17;

/// Timestamp identifier of a snapshot directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SnapshotId(NaiveDateTime);

impl SnapshotId {
    /// Create an id from a timestamp, truncated to whole seconds
    pub fn from_datetime(datetime: NaiveDateTime) -> Self {
        Self(datetime.with_nanosecond(0).unwrap_or(datetime))
    }

    /// Id for the current local time
    pub fn now() -> Self {
        Self::from_datetime(chrono::Local::now().naive_local())
    }

    /// Parse a directory name, rejecting anything that is not an exact id
    pub fn parse(s: &str) -> Option<Self> {
        if s.len() != SNAPSHOT_ID_LEN {
            return None;
        }
        let datetime = NaiveDateTime::parse_from_str(s, SNAPSHOT_ID_FORMAT).ok()?;
        let id = Self(datetime);
        // chrono accepts some non-padded fields; only canonical names count
        (id.to_string() == s).then_some(id)
    }

    /// The timestamp this id encodes
    pub fn datetime(&self) -> NaiveDateTime {
        self.0
    }

    /// The next id, one second later
    pub fn next(&self) -> Self {
        Self(self.0 + Duration::seconds(1))
    }

    /// Whole days elapsed between this snapshot and `now`
    pub fn age_days(&self, now: NaiveDateTime) -> i64 {
        (now - self.0).num_days()
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(SNAPSHOT_ID_FORMAT))
    }
}

impl FromStr for SnapshotId {
    type Err = SnapshotIdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| SnapshotIdParseError(s.to_string()))
    }
}

impl Serialize for SnapshotId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SnapshotId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Error returned when a string is not a snapshot id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotIdParseError(String);

impl fmt::Display for SnapshotIdParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid snapshot id: {}", self.0)
    }
}

impl std::error::Error for SnapshotIdParseError {}

/// A snapshot directory inside the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// Timestamp id (also the directory name)
    pub id: SnapshotId,
    /// Full path to the snapshot directory
    pub root: PathBuf,
}

impl Snapshot {
    /// Path of the per-run log inside this snapshot
    pub fn log_file(&self) -> PathBuf {
        self.root.join("run.log")
    }

    /// Path of the archive manifest inside this snapshot
    pub fn manifest_file(&self) -> PathBuf {
        self.root.join("manifest.json")
    }
}

/// One archived source path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveEntry {
    /// Workload the source belongs to
    pub workload: String,
    /// Source path as configured
    pub source: PathBuf,
    /// Archive file, relative to the snapshot root
    pub archive: PathBuf,
    /// Regular files stored
    pub files: u64,
    /// Directory entries stored
    pub directories: u64,
    /// Uncompressed bytes stored
    pub bytes: u64,
    /// Symbolic links that were skipped
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped_links: Vec<PathBuf>,
}

/// Contents of `manifest.json`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SnapshotManifest {
    /// Schema version for migration support
    pub schema_version: u32,
    /// False when archiving was aborted part-way
    #[serde(default)]
    pub complete: bool,
    /// Archives produced by the run
    pub entries: Vec<ArchiveEntry>,
    /// Configured sources that did not exist at archive time
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub missing_sources: Vec<PathBuf>,
}
