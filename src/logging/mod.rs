//! Logging for coldsnap
//!
//! - `RunLog`: explicit logger context threaded through a run. Buffers in
//!   memory until a snapshot directory exists, then appends JSON lines to
//!   `run.log` inside it.
//! - `init_tracing`: installs the console subscriber used by the binary.

mod entry;
mod run_log;

pub use entry::{Level, LogEntry};
pub use run_log::RunLog;

use tracing_subscriber::EnvFilter;

/// Install the console subscriber.
///
/// `RUST_LOG` overrides the default `info` filter.
pub fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    // A second install (e.g. from tests) is harmless
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
