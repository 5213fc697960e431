//! Workload controllers
//!
//! The pipeline stops and starts workloads only through
//! [`WorkloadController`]. OS-specific invocation details live behind it:
//!
//! - `ServiceController`: Windows services and systemd units
//! - `ContainerController`: docker compose projects
//! - `SystemController`: dispatches on the workload kind

mod container;
mod process;
mod service;

pub use container::{ContainerController, ContainerTarget};
pub use process::{run_with_timeout, CommandOutput};
pub use service::{ServiceController, ServiceManager};

use crate::models::{Timeouts, Workload, WorkloadKind};

/// Result of asking a workload to stop
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped,
    AlreadyStopped,
    Failed(String),
}

impl StopOutcome {
    /// Whether the workload is now quiesced
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed(_))
    }
}

/// Result of asking a workload to start
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    AlreadyRunning,
    Failed(String),
}

impl StartOutcome {
    /// Whether the workload is now running
    pub fn is_success(&self) -> bool {
        !matches!(self, Self::Failed(_))
    }
}

/// Stop/start capability for workloads
pub trait WorkloadController {
    fn stop(&self, workload: &Workload) -> StopOutcome;
    fn start(&self, workload: &Workload) -> StartOutcome;
}

/// The real controller, picking an implementation per workload kind
#[derive(Debug, Clone)]
pub struct SystemController {
    services: ServiceController,
    containers: ContainerController,
}

impl SystemController {
    pub fn new(timeouts: &Timeouts) -> Self {
        Self {
            services: ServiceController::new(
                ServiceManager::native(),
                timeouts.stop(),
                timeouts.start(),
            ),
            containers: ContainerController::new(timeouts.stop(), timeouts.start()),
        }
    }
}

fn container_target(workload: &Workload) -> ContainerTarget<'_> {
    match workload.kind {
        WorkloadKind::Container => ContainerTarget::Container(&workload.name),
        _ => ContainerTarget::Project {
            name: &workload.name,
            dir: workload.project_dir.as_deref(),
        },
    }
}

impl WorkloadController for SystemController {
    fn stop(&self, workload: &Workload) -> StopOutcome {
        match workload.kind {
            WorkloadKind::Service => self.services.stop(&workload.name),
            WorkloadKind::ContainerGroup | WorkloadKind::Container => {
                self.containers.stop(container_target(workload))
            }
        }
    }

    fn start(&self, workload: &Workload) -> StartOutcome {
        match workload.kind {
            WorkloadKind::Service => self.services.start(&workload.name),
            WorkloadKind::ContainerGroup | WorkloadKind::Container => {
                self.containers.start(container_target(workload))
            }
        }
    }
}
