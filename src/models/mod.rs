//! Core data models for coldsnap
//!
//! Workloads, snapshots, archive entries, and the policies that govern a run.

pub mod policy;
pub mod snapshot;
pub mod workload;

pub use policy::{RetentionPolicy, Timeouts};
pub use snapshot::{ArchiveEntry, Snapshot, SnapshotId, SnapshotManifest};
pub use workload::{Workload, WorkloadKind};
