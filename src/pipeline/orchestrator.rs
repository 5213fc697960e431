//! Pipeline orchestrator
//!
//! Sequences quiesce, archive, restart, and prune for one invocation. Each
//! phase has its own failure policy:
//!
//! - A failed stop aborts immediately. Nothing is archived and nothing is
//!   restarted, including workloads that were already stopped.
//! - A missing source is a warning. Any other archive failure marks the run
//!   aborted; every workload is still restarted, pruning is skipped.
//! - Restart and prune failures are warnings and never change the outcome.

use chrono::NaiveDateTime;

use super::command::{Command, Phase};
use super::state::PipelineState;
use crate::archive::{archive_destination, relative_archive_path, Archiver};
use crate::config::LoadedConfig;
use crate::controller::{StartOutcome, StopOutcome, WorkloadController};
use crate::error::{ColdsnapError, ColdsnapResult};
use crate::logging::RunLog;
use crate::models::{ArchiveEntry, Snapshot, SnapshotId, SnapshotManifest};
use crate::retention;
use crate::store::SnapshotStore;

const MANIFEST_SCHEMA_VERSION: u32 = 1;

/// Everything one run carries from phase to phase
#[derive(Debug)]
pub struct RunContext {
    pub loaded: LoadedConfig,
    pub store: SnapshotStore,
    pub log: RunLog,
    /// Wall-clock start of the run; names the snapshot and ages the store
    pub started_at: NaiveDateTime,
    /// Allocated during INIT
    pub snapshot: Option<Snapshot>,
}

impl RunContext {
    pub fn new(loaded: LoadedConfig, log: RunLog, started_at: NaiveDateTime) -> Self {
        let store = SnapshotStore::new(&loaded.config.snapshot_root);
        Self {
            loaded,
            store,
            log,
            started_at,
            snapshot: None,
        }
    }
}

/// Summary of a finished run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub command: Command,
    pub final_state: PipelineState,
    /// Every state the machine passed through, in order
    pub states: Vec<PipelineState>,
    pub snapshot: Option<SnapshotId>,
    pub archived: Vec<ArchiveEntry>,
    pub pruned: Vec<SnapshotId>,
    /// The fatal error, when the run was aborted
    pub abort_reason: Option<String>,
    pub warnings: Vec<String>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.final_state == PipelineState::Done
    }

    /// Process exit code: only QUIESCING/ARCHIVING failures are non-zero
    pub fn exit_code(&self) -> u8 {
        if self.is_success() {
            0
        } else {
            1
        }
    }

    pub fn reached(&self, state: PipelineState) -> bool {
        self.states.contains(&state)
    }
}

/// Drives the pipeline state machine
pub struct Orchestrator<'a> {
    controller: &'a dyn WorkloadController,
    archiver: Archiver,
    state: PipelineState,
    states: Vec<PipelineState>,
}

impl<'a> Orchestrator<'a> {
    pub fn new(controller: &'a dyn WorkloadController, archiver: Archiver) -> Self {
        Self {
            controller,
            archiver,
            state: PipelineState::Init,
            states: vec![PipelineState::Init],
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Execute `command` to completion
    pub fn execute(mut self, command: Command, ctx: &mut RunContext) -> RunReport {
        let mut archived = Vec::new();
        let mut pruned = Vec::new();
        let mut abort_reason: Option<String> = None;

        if command.allocates_snapshot() {
            if let Err(err) = self.init(ctx) {
                ctx.log.error(format!("Run aborted during initialization: {}", err));
                self.transition(PipelineState::Aborted);
                return self.report(command, ctx, archived, pruned, Some(err.to_string()));
            }
        }

        if command.includes(Phase::Quiesce) {
            self.transition(PipelineState::Quiescing);
            ctx.log.set_phase(Some(Phase::Quiesce));
            if let Err(err) = self.quiesce(ctx) {
                ctx.log.error(format!("Run aborted: {}", err));
                self.transition(PipelineState::Aborted);
                return self.report(command, ctx, archived, pruned, Some(err.to_string()));
            }
        }

        if command.includes(Phase::Archive) {
            self.transition(PipelineState::Archiving);
            ctx.log.set_phase(Some(Phase::Archive));
            match self.archive(ctx) {
                Ok(entries) => archived = entries,
                Err((entries, err)) => {
                    archived = entries;
                    ctx.log
                        .error(format!("Run aborted: {}; restarting workloads anyway", err));
                    abort_reason = Some(err.to_string());
                }
            }
        }

        if command.includes(Phase::Restart) {
            self.transition(PipelineState::Restarting);
            ctx.log.set_phase(Some(Phase::Restart));
            self.restart(ctx);
        }

        if abort_reason.is_some() {
            ctx.log.set_phase(None);
            self.transition(PipelineState::Aborted);
            return self.report(command, ctx, archived, pruned, abort_reason);
        }

        if command.includes(Phase::Prune) {
            self.transition(PipelineState::Pruning);
            ctx.log.set_phase(Some(Phase::Prune));
            pruned = self.prune(ctx);
        }

        ctx.log.set_phase(None);
        self.transition(PipelineState::Done);
        let warnings = ctx.log.warnings().len();
        if warnings == 0 {
            ctx.log.ok(format!("{} completed", command));
        } else {
            ctx.log
                .ok(format!("{} completed with {} warning(s)", command, warnings));
        }
        self.report(command, ctx, archived, pruned, None)
    }

    fn transition(&mut self, next: PipelineState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal transition {} -> {}",
            self.state,
            next
        );
        tracing::debug!(from = %self.state, to = %next, "pipeline transition");
        self.state = next;
        self.states.push(next);
    }

    /// INIT: allocate the snapshot, attach the run log, keep the config
    fn init(&mut self, ctx: &mut RunContext) -> ColdsnapResult<()> {
        let snapshot = ctx
            .store
            .allocate(SnapshotId::from_datetime(ctx.started_at))?;
        ctx.log.info(format!(
            "Allocated snapshot {} in {}",
            snapshot.id,
            ctx.store.root().display()
        ));

        // a log that cannot be attached is already reported as a warning
        let _ = ctx.log.attach(snapshot.log_file());

        ctx.store
            .write_config_copy(&snapshot, &ctx.loaded.file_name, &ctx.loaded.raw)?;
        ctx.snapshot = Some(snapshot);
        Ok(())
    }

    /// QUIESCING: stop workloads in declared order, first failure aborts
    fn quiesce(&mut self, ctx: &mut RunContext) -> ColdsnapResult<()> {
        let workloads = &ctx.loaded.config.workloads;
        let mut stopped: Vec<&str> = Vec::new();

        for workload in workloads {
            ctx.log.info(format!("Stopping {}", workload));
            match self.controller.stop(workload) {
                StopOutcome::Stopped => {
                    ctx.log.ok(format!("Stopped {}", workload));
                }
                StopOutcome::AlreadyStopped => {
                    ctx.log.ok(format!("{} was already stopped", workload));
                }
                StopOutcome::Failed(reason) => {
                    if !stopped.is_empty() {
                        ctx.log.warn(format!(
                            "Left stopped by this aborted run: {}",
                            stopped.join(", ")
                        ));
                    }
                    return Err(ColdsnapError::Quiesce {
                        workload: workload.name.clone(),
                        reason,
                    });
                }
            }
            stopped.push(&workload.name);
        }

        Ok(())
    }

    /// ARCHIVING: one archive per existing source path.
    ///
    /// On a fatal failure the entries archived so far are returned with the
    /// error so the manifest still records them.
    fn archive(
        &mut self,
        ctx: &mut RunContext,
    ) -> Result<Vec<ArchiveEntry>, (Vec<ArchiveEntry>, ColdsnapError)> {
        let snapshot = match ctx.snapshot.clone() {
            Some(snapshot) => snapshot,
            None => {
                return Err((
                    Vec::new(),
                    ColdsnapError::Io("No snapshot allocated for archiving".into()),
                ))
            }
        };

        let mut manifest = SnapshotManifest {
            schema_version: MANIFEST_SCHEMA_VERSION,
            complete: false,
            ..Default::default()
        };
        let mut failure = None;
        let archiver = self.archiver.clone().excluding(ctx.store.root());

        'workloads: for workload in &ctx.loaded.config.workloads {
            for source in &workload.paths {
                if !source.exists() {
                    ctx.log.warn(format!(
                        "Source {} of {} does not exist, skipping",
                        source.display(),
                        workload
                    ));
                    manifest.missing_sources.push(source.clone());
                    continue;
                }

                let destination = archive_destination(&snapshot.root, source);
                ctx.log.info(format!(
                    "Archiving {} -> {}",
                    source.display(),
                    destination.display()
                ));

                match archiver.archive(source, &destination, &mut ctx.log) {
                    Ok(stats) => {
                        ctx.log.ok(format!(
                            "Archived {} ({} files, {} bytes)",
                            source.display(),
                            stats.files,
                            stats.bytes
                        ));
                        manifest.entries.push(ArchiveEntry {
                            workload: workload.name.clone(),
                            source: source.clone(),
                            archive: relative_archive_path(source),
                            files: stats.files,
                            directories: stats.directories,
                            bytes: stats.bytes,
                            skipped_links: stats.skipped_links,
                        });
                    }
                    Err(err) if !err.is_fatal() => {
                        ctx.log.warn(format!("{}, skipping", err));
                        manifest.missing_sources.push(source.clone());
                    }
                    Err(err) => {
                        failure = Some(ColdsnapError::Archive(err));
                        break 'workloads;
                    }
                }
            }
        }

        manifest.complete = failure.is_none();
        if let Err(err) = ctx.store.write_manifest(&snapshot, &manifest) {
            ctx.log.warn(format!("Failed to write manifest: {}", err));
        }

        match failure {
            None => Ok(manifest.entries),
            Some(err) => Err((manifest.entries, err)),
        }
    }

    /// RESTARTING: start every workload in declared order; never fatal
    fn restart(&mut self, ctx: &mut RunContext) {
        for workload in &ctx.loaded.config.workloads {
            ctx.log.info(format!("Starting {}", workload));
            match self.controller.start(workload) {
                StartOutcome::Started => ctx.log.ok(format!("Started {}", workload)),
                StartOutcome::AlreadyRunning => {
                    ctx.log.ok(format!("{} was already running", workload))
                }
                StartOutcome::Failed(reason) => {
                    let err = ColdsnapError::Restart {
                        workload: workload.name.clone(),
                        reason,
                    };
                    ctx.log.warn(err.to_string());
                }
            }
        }
    }

    /// PRUNING: apply retention; never fatal
    fn prune(&mut self, ctx: &mut RunContext) -> Vec<SnapshotId> {
        let policy = ctx.loaded.config.retention;
        match retention::prune(&ctx.store, &policy, ctx.started_at, &mut ctx.log) {
            Ok(report) => report.deleted,
            Err(err) => {
                ctx.log.warn(format!("Pruning skipped: {}", err));
                Vec::new()
            }
        }
    }

    fn report(
        self,
        command: Command,
        ctx: &RunContext,
        archived: Vec<ArchiveEntry>,
        pruned: Vec<SnapshotId>,
        abort_reason: Option<String>,
    ) -> RunReport {
        RunReport {
            command,
            final_state: self.state,
            states: self.states,
            snapshot: ctx.snapshot.as_ref().map(|s| s.id),
            archived,
            pruned,
            abort_reason,
            warnings: ctx.log.warnings().to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackupConfig;
    use crate::models::{RetentionPolicy, Workload};
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::time::Duration;
    use tempfile::TempDir;

    /// Records calls and answers from a script keyed by workload name
    #[derive(Default)]
    struct ScriptedController {
        stop_results: HashMap<String, StopOutcome>,
        start_results: HashMap<String, StartOutcome>,
        calls: RefCell<Vec<String>>,
    }

    impl ScriptedController {
        fn fail_stop(mut self, name: &str) -> Self {
            self.stop_results
                .insert(name.into(), StopOutcome::Failed("access denied".into()));
            self
        }

        fn fail_start(mut self, name: &str) -> Self {
            self.start_results
                .insert(name.into(), StartOutcome::Failed("timed out".into()));
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.borrow().clone()
        }
    }

    impl WorkloadController for ScriptedController {
        fn stop(&self, workload: &Workload) -> StopOutcome {
            self.calls.borrow_mut().push(format!("stop {}", workload.name));
            self.stop_results
                .get(&workload.name)
                .cloned()
                .unwrap_or(StopOutcome::Stopped)
        }

        fn start(&self, workload: &Workload) -> StartOutcome {
            self.calls.borrow_mut().push(format!("start {}", workload.name));
            self.start_results
                .get(&workload.name)
                .cloned()
                .unwrap_or(StartOutcome::Started)
        }
    }

    fn started_at() -> NaiveDateTime {
        chrono::NaiveDate::from_ymd_opt(2025, 6, 15)
            .unwrap()
            .and_hms_opt(3, 0, 0)
            .unwrap()
    }

    fn make_source(root: &Path, name: &str) -> PathBuf {
        let dir = root.join("data").join(name);
        fs::create_dir_all(dir.join("sub")).unwrap();
        fs::write(dir.join("db.sqlite"), format!("{} contents", name)).unwrap();
        fs::write(dir.join("sub/notes.txt"), b"hello").unwrap();
        dir
    }

    fn context(temp: &TempDir, workloads: Vec<Workload>, retention: RetentionPolicy) -> RunContext {
        let config = BackupConfig {
            snapshot_root: temp.path().join("snapshots"),
            retention,
            timeouts: Default::default(),
            workloads,
        };
        let raw = serde_json::to_vec_pretty(&config).unwrap();
        let loaded = LoadedConfig {
            config,
            raw,
            file_name: "config.json".into(),
        };
        RunContext::new(loaded, RunLog::new(), started_at())
    }

    fn three_workloads(temp: &TempDir) -> Vec<Workload> {
        vec![
            Workload::service("alpha", vec![make_source(temp.path(), "alpha")]),
            Workload::service("beta", vec![make_source(temp.path(), "beta")]),
            Workload::container_group("gamma", vec![make_source(temp.path(), "gamma")]),
        ]
    }

    fn archiver() -> Archiver {
        Archiver::new(Duration::from_secs(60))
    }

    #[test]
    fn test_full_run_order_and_outputs() {
        let temp = TempDir::new().unwrap();
        let controller = ScriptedController::default();
        let mut ctx = context(&temp, three_workloads(&temp), RetentionPolicy::default());

        let report = Orchestrator::new(&controller, archiver()).execute(Command::Run, &mut ctx);

        assert!(report.is_success());
        assert_eq!(report.exit_code(), 0);
        assert_eq!(
            report.states,
            [
                PipelineState::Init,
                PipelineState::Quiescing,
                PipelineState::Archiving,
                PipelineState::Restarting,
                PipelineState::Pruning,
                PipelineState::Done
            ]
        );
        assert_eq!(
            controller.calls(),
            [
                "stop alpha",
                "stop beta",
                "stop gamma",
                "start alpha",
                "start beta",
                "start gamma"
            ]
        );

        let snapshot = ctx.snapshot.clone().unwrap();
        assert_eq!(snapshot.id.to_string(), "2025-06-15 030000");
        assert!(snapshot.root.join("config.json").exists());
        assert!(snapshot.log_file().exists());
        assert_eq!(report.archived.len(), 3);
        for entry in &report.archived {
            assert!(snapshot.root.join(&entry.archive).exists());
            assert_eq!(entry.files, 2);
        }

        let manifest = ctx.store.read_manifest(&snapshot).unwrap().unwrap();
        assert!(manifest.complete);
        assert_eq!(manifest.entries.len(), 3);
    }

    #[test]
    fn test_config_copy_is_verbatim() {
        let temp = TempDir::new().unwrap();
        let controller = ScriptedController::default();
        let mut ctx = context(&temp, Vec::new(), RetentionPolicy::default());
        ctx.loaded.raw = b"{\n  \"snapshot_root\": \"elsewhere\"   \n}\n".to_vec();

        Orchestrator::new(&controller, archiver()).execute(Command::Backup, &mut ctx);

        let snapshot = ctx.snapshot.unwrap();
        assert_eq!(
            fs::read(snapshot.root.join("config.json")).unwrap(),
            ctx.loaded.raw
        );
    }

    #[test]
    fn test_quiesce_failure_aborts_without_restart() {
        let temp = TempDir::new().unwrap();
        let controller = ScriptedController::default().fail_stop("beta");
        let mut ctx = context(&temp, three_workloads(&temp), RetentionPolicy::default());

        let report = Orchestrator::new(&controller, archiver()).execute(Command::Run, &mut ctx);

        assert_eq!(report.final_state, PipelineState::Aborted);
        assert_eq!(report.exit_code(), 1);
        assert!(!report.reached(PipelineState::Archiving));
        assert!(!report.reached(PipelineState::Restarting));
        // gamma is never stopped, alpha is never restarted
        assert_eq!(controller.calls(), ["stop alpha", "stop beta"]);
        assert!(report.archived.is_empty());
        assert!(report.abort_reason.unwrap().contains("beta"));

        let snapshot = ctx.snapshot.unwrap();
        assert!(!snapshot.manifest_file().exists());
        let log = RunLog::read_all(&snapshot.log_file()).unwrap();
        assert!(log.iter().any(|e| e.level == crate::logging::Level::Error));
    }

    #[test]
    fn test_already_stopped_counts_as_success() {
        let temp = TempDir::new().unwrap();
        let mut controller = ScriptedController::default();
        controller
            .stop_results
            .insert("alpha".into(), StopOutcome::AlreadyStopped);
        controller
            .start_results
            .insert("alpha".into(), StartOutcome::AlreadyRunning);
        let mut ctx = context(&temp, three_workloads(&temp), RetentionPolicy::default());

        let report = Orchestrator::new(&controller, archiver()).execute(Command::Run, &mut ctx);
        assert!(report.is_success());
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_missing_source_is_warning() {
        let temp = TempDir::new().unwrap();
        let controller = ScriptedController::default();
        let gone = temp.path().join("data/never-created");
        let workloads = vec![Workload::service(
            "alpha",
            vec![gone.clone(), make_source(temp.path(), "alpha")],
        )];
        let mut ctx = context(&temp, workloads, RetentionPolicy::default());

        let report = Orchestrator::new(&controller, archiver()).execute(Command::Run, &mut ctx);

        assert!(report.is_success());
        assert_eq!(report.archived.len(), 1);
        assert_eq!(report.warnings.len(), 1);
        let manifest = ctx
            .store
            .read_manifest(ctx.snapshot.as_ref().unwrap())
            .unwrap()
            .unwrap();
        assert_eq!(manifest.missing_sources, [gone]);
    }

    #[test]
    fn test_archive_failure_aborts_but_restarts_everyone() {
        let temp = TempDir::new().unwrap();
        let controller = ScriptedController::default();
        let mut ctx = context(&temp, three_workloads(&temp), RetentionPolicy::default());
        // an archive deadline of zero fails on the first directory entry
        let report = Orchestrator::new(&controller, Archiver::new(Duration::ZERO))
            .execute(Command::Run, &mut ctx);

        assert_eq!(report.final_state, PipelineState::Aborted);
        assert_eq!(report.exit_code(), 1);
        assert!(report.reached(PipelineState::Restarting));
        assert!(!report.reached(PipelineState::Pruning));
        assert_eq!(
            controller.calls(),
            [
                "stop alpha",
                "stop beta",
                "stop gamma",
                "start alpha",
                "start beta",
                "start gamma"
            ]
        );

        let snapshot = ctx.snapshot.unwrap();
        let manifest = ctx.store.read_manifest(&snapshot).unwrap().unwrap();
        assert!(!manifest.complete);
    }

    #[test]
    fn test_restart_failure_is_only_a_warning() {
        let temp = TempDir::new().unwrap();
        let controller = ScriptedController::default().fail_start("alpha");
        let mut ctx = context(&temp, three_workloads(&temp), RetentionPolicy::default());

        let report = Orchestrator::new(&controller, archiver()).execute(Command::Run, &mut ctx);

        assert!(report.is_success());
        assert_eq!(report.exit_code(), 0);
        assert_eq!(report.warnings.len(), 1);
        // later workloads are still started
        assert!(controller.calls().contains(&"start gamma".to_string()));
    }

    #[test]
    fn test_prunes_after_backup() {
        let temp = TempDir::new().unwrap();
        let controller = ScriptedController::default();
        let retention = RetentionPolicy {
            days: 30,
            min_versions: 1,
            max_versions: 2,
        };
        let mut ctx = context(&temp, Vec::new(), retention);
        let root = temp.path().join("snapshots");
        for name in ["2025-06-01 030000", "2025-06-08 030000"] {
            fs::create_dir_all(root.join(name)).unwrap();
        }

        let report = Orchestrator::new(&controller, archiver()).execute(Command::Run, &mut ctx);

        assert!(report.is_success());
        assert_eq!(report.pruned.len(), 1);
        assert_eq!(report.pruned[0].to_string(), "2025-06-01 030000");
        assert!(ctx.snapshot.unwrap().root.exists());
    }

    #[test]
    fn test_prune_command_allocates_nothing() {
        let temp = TempDir::new().unwrap();
        let controller = ScriptedController::default();
        let mut ctx = context(&temp, three_workloads(&temp), RetentionPolicy::default());

        let report = Orchestrator::new(&controller, archiver()).execute(Command::Prune, &mut ctx);

        assert!(report.is_success());
        assert!(report.snapshot.is_none());
        assert!(controller.calls().is_empty());
        assert_eq!(
            report.states,
            [PipelineState::Init, PipelineState::Pruning, PipelineState::Done]
        );
        assert!(!ctx.log.is_attached());
    }
}
