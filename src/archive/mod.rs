//! Archiving of workload data
//!
//! - `Archiver`: writes one store-only zip archive per source path
//! - `layout`: where each archive lives inside a snapshot

mod archiver;
pub mod layout;

pub use archiver::{ArchiveStats, Archiver};
pub use layout::{archive_destination, relative_archive_path};
