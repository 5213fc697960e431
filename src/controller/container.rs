//! Docker containers and compose projects

use std::path::Path;
use std::process::Command;
use std::time::Duration;

use super::process::{run_with_timeout, CommandOutput};
use super::service::failure_reason;
use super::{StartOutcome, StopOutcome};

/// What a container workload name refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerTarget<'a> {
    /// A single container, `docker stop|start <name>`
    Container(&'a str),
    /// A compose project, stopped and started as a unit
    Project {
        name: &'a str,
        dir: Option<&'a Path>,
    },
}

/// Controls docker containers and compose projects
#[derive(Debug, Clone)]
pub struct ContainerController {
    stop_timeout: Duration,
    start_timeout: Duration,
}

impl ContainerController {
    pub fn new(stop_timeout: Duration, start_timeout: Duration) -> Self {
        Self {
            stop_timeout,
            start_timeout,
        }
    }

    /// `docker <action> <name>` for a container,
    /// `docker compose [--project-directory <dir>] -p <name> <action>` for a project
    pub(crate) fn command(&self, action: &str, target: ContainerTarget<'_>) -> Command {
        let mut command = Command::new("docker");
        match target {
            ContainerTarget::Container(name) => {
                command.arg(action).arg(name);
            }
            ContainerTarget::Project { name, dir } => {
                command.arg("compose");
                if let Some(dir) = dir {
                    command.arg("--project-directory").arg(dir);
                }
                command.arg("-p").arg(name).arg(action);
            }
        }
        command
    }

    pub fn stop(&self, target: ContainerTarget<'_>) -> StopOutcome {
        let command = self.command("stop", target);
        match run_with_timeout(command, self.stop_timeout) {
            Ok(output) => classify_stop(&output),
            Err(reason) => StopOutcome::Failed(reason),
        }
    }

    pub fn start(&self, target: ContainerTarget<'_>) -> StartOutcome {
        let command = self.command("start", target);
        match run_with_timeout(command, self.start_timeout) {
            Ok(output) => classify_start(&output),
            Err(reason) => StartOutcome::Failed(reason),
        }
    }
}

fn is_not_running_line(line: &str) -> bool {
    let lower = line.to_lowercase();
    lower.contains("no container") || lower.contains("is not running")
}

/// A failed stop counts as already stopped only if every line of its
/// output says so; anything else means some container may still be live.
fn classify_stop(output: &CommandOutput) -> StopOutcome {
    let text = output.combined();
    let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty()).peekable();
    let has_output = lines.peek().is_some();
    let only_not_running = has_output && lines.all(is_not_running_line);

    if output.success {
        if only_not_running {
            StopOutcome::AlreadyStopped
        } else {
            StopOutcome::Stopped
        }
    } else if only_not_running {
        StopOutcome::AlreadyStopped
    } else {
        StopOutcome::Failed(failure_reason(output, &text))
    }
}

fn classify_start(output: &CommandOutput) -> StartOutcome {
    let text = output.combined();
    if output.success {
        StartOutcome::Started
    } else if text.to_lowercase().contains("already running") {
        StartOutcome::AlreadyRunning
    } else {
        StartOutcome::Failed(failure_reason(output, &text))
    }
}
