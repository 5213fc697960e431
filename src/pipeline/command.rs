//! Commands and the pipeline phases they trigger

use std::fmt;

use serde::{Deserialize, Serialize};

/// One step of the backup pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Stop every workload
    Quiesce,
    /// Archive every configured source into the snapshot
    Archive,
    /// Start every workload again
    Restart,
    /// Apply the retention policy to the snapshot store
    Prune,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Quiesce => write!(f, "quiesce"),
            Phase::Archive => write!(f, "archive"),
            Phase::Restart => write!(f, "restart"),
            Phase::Prune => write!(f, "prune"),
        }
    }
}

/// A pipeline invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Full pipeline: stop, archive, restart, prune
    Run,
    /// Stop, archive, restart without pruning
    Backup,
    /// Only apply the retention policy
    Prune,
}

const RUN_PHASES: &[Phase] = &[Phase::Quiesce, Phase::Archive, Phase::Restart, Phase::Prune];
const BACKUP_PHASES: &[Phase] = &[Phase::Quiesce, Phase::Archive, Phase::Restart];
const PRUNE_PHASES: &[Phase] = &[Phase::Prune];

impl Command {
    /// Ordered phases this command executes
    pub fn phases(&self) -> &'static [Phase] {
        match self {
            Command::Run => RUN_PHASES,
            Command::Backup => BACKUP_PHASES,
            Command::Prune => PRUNE_PHASES,
        }
    }

    pub fn includes(&self, phase: Phase) -> bool {
        self.phases().contains(&phase)
    }

    /// Whether the command produces a snapshot directory
    pub fn allocates_snapshot(&self) -> bool {
        self.includes(Phase::Archive)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Run => write!(f, "run"),
            Command::Backup => write!(f, "backup"),
            Command::Prune => write!(f, "prune"),
        }
    }
}
