//! coldsnap - cold backups for stoppable workloads
//!
//! A run stops every configured workload, archives its on-disk state into a
//! timestamped snapshot directory, starts the workloads again, and prunes
//! old snapshots under a retention policy.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - `config`: Configuration discovery, parsing and validation
//! - `error`: Custom error types
//! - `models`: Workloads, snapshot ids, retention and timeout settings
//! - `controller`: Stopping and starting services and container groups
//! - `archive`: Store-only zip archives of source paths
//! - `store`: Snapshot directories on disk
//! - `retention`: Prune planning and execution
//! - `logging`: Per-run JSONL log and console output
//! - `pipeline`: The phase state machine and orchestrator
//! - `cli`: Command handlers for the binary
//!
//! # Example
//!
//! ```rust,ignore
//! use coldsnap::config::{ColdsnapPaths, ConfigSource, FileConfigSource};
//!
//! let paths = ColdsnapPaths::resolve(None);
//! let loaded = FileConfigSource::from_paths(&paths).load()?;
//! ```

pub mod archive;
pub mod cli;
pub mod config;
pub mod controller;
pub mod error;
pub mod logging;
pub mod models;
pub mod pipeline;
pub mod retention;
pub mod store;

pub use error::{ColdsnapError, ColdsnapResult};
