// src/exec/mod.rs

//! Execution engine.
//!
//! - [`plan`] turns the priority list into an arena of nodes with runner
//!   instances already constructed.
//! - [`sequential`] walks priority buckets with a single worker.
//! - [`concurrent`] runs a task flow driven by the pure [`flow`] scheduler.
//! - [`execute`] holds the per-runner contract shared by both modes.

pub mod concurrent;
pub mod execute;
pub mod flow;
pub mod plan;
pub mod report;
pub mod sequential;

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::Config;
use crate::toolchain::ToolchainDispatcher;
use crate::types::ExecutionMode;

pub use execute::{execute_runner, RunnerInvocation, WorkdirGuard};
pub use flow::{FlowScheduler, FlowStep, NodeResult, NodeRunState};
pub use plan::{ExecutionPlan, PlannedNode, PlannedStep};
pub use report::{ExecutionReport, RunnerRecord};

/// Read-only state shared by all runner invocations of one execution.
pub struct ExecutionContext {
    pub config: Config,
    pub dispatcher: Option<Arc<dyn ToolchainDispatcher>>,
    pub repo_root: PathBuf,
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("repo_root", &self.repo_root)
            .field("has_dispatcher", &self.dispatcher.is_some())
            .finish_non_exhaustive()
    }
}

/// Run `plan` in the mode configured in `[execution]` and log a summary.
pub async fn execute(plan: ExecutionPlan, ctx: Arc<ExecutionContext>) -> ExecutionReport {
    let report = match ctx.config.execution.mode {
        ExecutionMode::Sequential => sequential::run_sequential(plan, Arc::clone(&ctx)).await,
        ExecutionMode::Concurrent => {
            let max_parallel = ctx.config.execution.max_parallel;
            concurrent::run_concurrent(plan, Arc::clone(&ctx), max_parallel).await
        }
    };
    report.log_summary();
    report
}
