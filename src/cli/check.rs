//! `check` command handler

use super::format::format_cap;
use crate::config::{ColdsnapPaths, ConfigSource, FileConfigSource};
use crate::error::ColdsnapResult;

/// Load and validate the configuration, then print what a run would do
pub fn handle_check_command(paths: &ColdsnapPaths) -> ColdsnapResult<()> {
    let loaded = FileConfigSource::from_paths(paths).load()?;
    let config = &loaded.config;

    println!("Configuration OK: {}", paths.config_file().display());
    println!();
    println!("Snapshot root: {}", config.snapshot_root.display());
    println!(
        "Retention:     {} day(s), keep at least {}, at most {}",
        config.retention.days,
        config.retention.min_versions,
        format_cap(config.retention.max_versions)
    );
    println!(
        "Timeouts:      stop {}s, start {}s, archive {}s",
        config.timeouts.stop_secs, config.timeouts.start_secs, config.timeouts.archive_secs
    );
    if config.retention.has_conflict() {
        println!("Note: min_versions exceeds max_versions; max_versions wins");
    }
    println!();

    if config.workloads.is_empty() {
        println!("No workloads configured.");
        return Ok(());
    }

    println!(
        "Workloads ({}, {} source path(s)), in stop order:",
        config.workloads.len(),
        config.source_count()
    );
    for workload in &config.workloads {
        println!("  {}", workload);
        if let Some(dir) = &workload.project_dir {
            println!("    project: {}", dir.display());
        }
        for path in &workload.paths {
            let status = if path.exists() { "" } else { " (missing)" };
            println!("    {}{}", path.display(), status);
        }
    }
    Ok(())
}
