//! Pipeline state machine
//!
//! ```text
//! INIT -> QUIESCING -> ARCHIVING -> RESTARTING -> PRUNING -> DONE
//!   |         |            |             |
//!   +---------+------------+-------------+--> ABORTED
//! ```
//!
//! A failed archive still restarts every stopped workload before the run
//! ends in ABORTED, so RESTARTING -> ABORTED is legal only when the run was
//! already marked for abort.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineState {
    Init,
    Quiescing,
    Archiving,
    Restarting,
    Pruning,
    Done,
    Aborted,
}

impl PipelineState {
    /// Whether the machine may move from `self` to `next`
    pub fn can_transition_to(&self, next: PipelineState) -> bool {
        use PipelineState::*;
        matches!(
            (self, next),
            (Init, Quiescing)
                | (Init, Pruning)
                | (Init, Done)
                | (Init, Aborted)
                | (Quiescing, Archiving)
                | (Quiescing, Aborted)
                | (Archiving, Restarting)
                | (Archiving, Aborted)
                | (Restarting, Pruning)
                | (Restarting, Done)
                | (Restarting, Aborted)
                | (Pruning, Done)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Done | PipelineState::Aborted)
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::Init => "INIT",
            PipelineState::Quiescing => "QUIESCING",
            PipelineState::Archiving => "ARCHIVING",
            PipelineState::Restarting => "RESTARTING",
            PipelineState::Pruning => "PRUNING",
            PipelineState::Done => "DONE",
            PipelineState::Aborted => "ABORTED",
        };
        write!(f, "{}", name)
    }
}
