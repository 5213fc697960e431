//! Snapshot store
//!
//! A directory whose immediate children are snapshot directories named by
//! [`SnapshotId`]. Anything else in the root is ignored.
//!
//! The store does no locking: two runs against the same root at the same
//! time are not coordinated.

mod file_io;

pub use file_io::{read_json_required, write_atomic, write_json_atomic};

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{ColdsnapError, ColdsnapResult};
use crate::models::{Snapshot, SnapshotId, SnapshotManifest};

/// How many later ids to try when the current second is already taken
const MAX_ALLOCATION_ATTEMPTS: u32 = 60;

/// Snapshot directories on disk
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    root: PathBuf,
}

impl SnapshotStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create a fresh snapshot directory, starting at `id`.
    ///
    /// If a directory with that id already exists (two runs in the same
    /// second), the id is advanced one second at a time until a free one
    /// is found, so ids stay fixed-width and strictly increasing.
    pub fn allocate(&self, id: SnapshotId) -> ColdsnapResult<Snapshot> {
        fs::create_dir_all(&self.root).map_err(|e| {
            ColdsnapError::Io(format!(
                "Failed to create snapshot root {}: {}",
                self.root.display(),
                e
            ))
        })?;

        // never go backwards past the newest existing snapshot
        let mut candidate = match self.list()?.last() {
            Some(newest) if newest.id >= id => newest.id.next(),
            _ => id,
        };

        for _ in 0..MAX_ALLOCATION_ATTEMPTS {
            let root = self.root.join(candidate.to_string());
            match fs::create_dir(&root) {
                Ok(()) => return Ok(Snapshot { id: candidate, root }),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    candidate = candidate.next();
                }
                Err(e) => {
                    return Err(ColdsnapError::Io(format!(
                        "Failed to create snapshot directory {}: {}",
                        root.display(),
                        e
                    )))
                }
            }
        }

        Err(ColdsnapError::Io(format!(
            "No free snapshot id near {} after {} attempts",
            id, MAX_ALLOCATION_ATTEMPTS
        )))
    }

    /// All snapshots, oldest first
    pub fn list(&self) -> ColdsnapResult<Vec<Snapshot>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let mut snapshots = Vec::new();
        for entry in fs::read_dir(&self.root).map_err(|e| {
            ColdsnapError::Io(format!("Failed to read snapshot root: {}", e))
        })? {
            let entry = entry
                .map_err(|e| ColdsnapError::Io(format!("Failed to read directory entry: {}", e)))?;

            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            if !is_dir {
                continue;
            }

            let name = entry.file_name();
            if let Some(id) = name.to_str().and_then(SnapshotId::parse) {
                snapshots.push(Snapshot {
                    id,
                    root: entry.path(),
                });
            }
        }

        snapshots.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(snapshots)
    }

    /// Look up a snapshot by its id string
    pub fn get(&self, id: &str) -> ColdsnapResult<Snapshot> {
        let id = SnapshotId::parse(id).ok_or_else(|| ColdsnapError::snapshot_not_found(id))?;
        let root = self.root.join(id.to_string());
        if root.is_dir() {
            Ok(Snapshot { id, root })
        } else {
            Err(ColdsnapError::snapshot_not_found(id.to_string()))
        }
    }

    /// Delete a snapshot directory and everything in it
    pub fn delete(&self, snapshot: &Snapshot) -> ColdsnapResult<()> {
        fs::remove_dir_all(&snapshot.root).map_err(|e| ColdsnapError::Prune {
            snapshot: snapshot.id.to_string(),
            reason: e.to_string(),
        })
    }

    /// Write the verbatim configuration copy into a snapshot
    pub fn write_config_copy(
        &self,
        snapshot: &Snapshot,
        file_name: &str,
        raw: &[u8],
    ) -> ColdsnapResult<PathBuf> {
        let path = snapshot.root.join(file_name);
        write_atomic(&path, raw)?;
        Ok(path)
    }

    /// Persist the archive manifest of a snapshot
    pub fn write_manifest(
        &self,
        snapshot: &Snapshot,
        manifest: &SnapshotManifest,
    ) -> ColdsnapResult<()> {
        write_json_atomic(snapshot.manifest_file(), manifest)
    }

    /// Read a snapshot's manifest, if it has one
    pub fn read_manifest(&self, snapshot: &Snapshot) -> ColdsnapResult<Option<SnapshotManifest>> {
        let path = snapshot.manifest_file();
        if !path.exists() {
            return Ok(None);
        }
        read_json_required(path).map(Some)
    }

    /// Total size in bytes of everything inside a snapshot
    pub fn size_of(&self, snapshot: &Snapshot) -> u64 {
        WalkDir::new(&snapshot.root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter_map(|e| e.metadata().ok())
            .map(|m| m.len())
            .sum()
    }
}
