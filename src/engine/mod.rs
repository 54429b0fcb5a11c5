// src/engine/mod.rs

//! Top-level wiring of one invocation.

mod dispatched;
mod orchestrator;
mod selection;

pub use dispatched::exec_dispatched_runner;
pub use orchestrator::{ChangeSource, Orchestrator, RunOutcome, RunRequest};
pub use selection::TargetSelector;
