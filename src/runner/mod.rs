// src/runner/mod.rs

//! Runners and the registry that builds them from step descriptors.

pub mod registry;
pub mod shell;

use std::any::Any;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::config::Config;
use crate::model::{Component, TargetId};

pub use registry::{RunnerData, RunnerKey, RunnerRegistry};

/// Type-erased, shareable runner configuration.
pub type AnyConfig = Arc<dyn Any + Send + Sync>;

/// An executable handler for one step.
///
/// `run` is a coarse blocking unit; the execution engine calls it from a
/// blocking thread and never interrupts it.
pub trait Runner: Send + Sync {
    fn run(&self, ctx: &RunnerContext<'_>) -> anyhow::Result<()>;
}

/// Everything a runner gets to see about the invocation.
#[derive(Clone, Copy)]
pub struct RunnerContext<'a> {
    pub component: &'a Component,
    pub target: &'a TargetId,
    pub step_index: usize,
    pub runner_index: usize,
    pub runner_id: &'a str,
    pub toolchain: &'a str,
    pub repo_root: &'a Path,
    pub config: &'a Config,
}

impl fmt::Debug for RunnerContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunnerContext")
            .field("component", &self.component.name)
            .field("target", &self.target)
            .field("step_index", &self.step_index)
            .field("runner_index", &self.runner_index)
            .field("runner_id", &self.runner_id)
            .field("toolchain", &self.toolchain)
            .finish_non_exhaustive()
    }
}

/// A constructed runner plus its typed config and effective toolchain.
#[derive(Clone)]
pub struct RunnerInstance {
    pub runner_id: String,
    pub runner: Arc<dyn Runner>,
    pub config: AnyConfig,
    pub toolchain: String,
}

impl RunnerInstance {
    /// The typed config, if it is a `C`.
    pub fn config_as<C: 'static>(&self) -> Option<&C> {
        self.config.downcast_ref::<C>()
    }
}

impl fmt::Debug for RunnerInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunnerInstance")
            .field("runner_id", &self.runner_id)
            .field("toolchain", &self.toolchain)
            .finish_non_exhaustive()
    }
}
