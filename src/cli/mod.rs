//! CLI command handlers
//!
//! This module contains the implementation of CLI commands,
//! bridging the clap argument parsing with the pipeline.

pub mod check;
pub mod format;
pub mod pipeline;
pub mod snapshots;

pub use check::handle_check_command;
pub use pipeline::{handle_pipeline_command, handle_prune_dry_run};
pub use snapshots::handle_list_command;
