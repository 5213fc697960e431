//! `run`, `backup`, and `prune` command handlers
//!
//! These build a [`RunContext`] from the loaded configuration and hand it to
//! the orchestrator with the real system controller.

use chrono::Local;

use super::format::format_cap;
use crate::archive::Archiver;
use crate::config::{ColdsnapPaths, ConfigSource, FileConfigSource};
use crate::controller::SystemController;
use crate::error::ColdsnapResult;
use crate::logging::RunLog;
use crate::pipeline::{Command, Orchestrator, RunContext, RunReport};
use crate::retention::plan_prune;
use crate::store::SnapshotStore;

/// Execute a pipeline command and print its summary
pub fn handle_pipeline_command(paths: &ColdsnapPaths, command: Command) -> ColdsnapResult<RunReport> {
    let loaded = FileConfigSource::from_paths(paths).load()?;
    let started_at = Local::now().naive_local();

    let mut log = RunLog::new();
    log.info(format!(
        "Starting {} with {} ({} workload(s))",
        command,
        paths.config_file().display(),
        loaded.config.workloads.len()
    ));

    let controller = SystemController::new(&loaded.config.timeouts);
    let archiver = Archiver::new(loaded.config.timeouts.archive());
    let mut ctx = RunContext::new(loaded, log, started_at);

    let report = Orchestrator::new(&controller, archiver).execute(command, &mut ctx);
    print_report(&report, &ctx);
    Ok(report)
}

fn print_report(report: &RunReport, ctx: &RunContext) {
    println!();
    println!("Run Summary");
    println!("===========");
    println!("Command: {}", report.command);
    println!("Result:  {}", report.final_state);
    if let Some(id) = report.snapshot {
        println!("Snapshot: {}", id);
    }
    if let Some(path) = ctx.log.path() {
        println!("Log:      {}", path.display());
    }
    if !report.archived.is_empty() {
        println!("Archived: {} source(s)", report.archived.len());
    }
    if !report.pruned.is_empty() {
        println!("Pruned:   {} snapshot(s)", report.pruned.len());
    }
    if !report.warnings.is_empty() {
        println!();
        println!("Warnings ({}):", report.warnings.len());
        for warning in &report.warnings {
            println!("  - {}", warning);
        }
    }
    if let Some(reason) = &report.abort_reason {
        println!();
        println!("Aborted: {}", reason);
    }
}

/// Show what `prune` would delete without touching the store
pub fn handle_prune_dry_run(paths: &ColdsnapPaths) -> ColdsnapResult<()> {
    let loaded = FileConfigSource::from_paths(paths).load()?;
    let policy = loaded.config.retention;
    let store = SnapshotStore::new(&loaded.config.snapshot_root);

    let ids: Vec<_> = store.list()?.iter().map(|s| s.id).collect();
    let plan = plan_prune(&ids, &policy, Local::now().naive_local());

    println!("Prune Plan");
    println!("==========");
    println!(
        "Retention policy: {} day(s), keep at least {}, at most {}",
        policy.days,
        policy.min_versions,
        format_cap(policy.max_versions)
    );
    if policy.has_conflict() {
        println!("Note: min_versions exceeds max_versions; max_versions wins");
    }
    println!("Current snapshots: {}", ids.len());
    println!();

    if plan.is_empty() {
        println!("No snapshots to prune.");
        return Ok(());
    }

    for id in &plan.delete {
        let reason = if plan.by_cap.contains(id) {
            "over max_versions"
        } else {
            "older than retention window"
        };
        println!("  would delete {} ({})", id, reason);
    }
    for id in &plan.spared {
        println!("  kept by min_versions: {}", id);
    }
    println!();
    println!(
        "{} snapshot(s) would be deleted, {} kept.",
        plan.delete.len(),
        plan.keep.len()
    );
    Ok(())
}
