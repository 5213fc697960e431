//! The backup pipeline: commands, phases, the state machine, and the
//! orchestrator that drives them.

mod command;
mod orchestrator;
mod state;

pub use command::{Command, Phase};
pub use orchestrator::{Orchestrator, RunContext, RunReport};
pub use state::PipelineState;
