// src/exec/execute.rs

//! Running one runner instance, and one planned node.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::errors::{RepodagError, Result};
use crate::exec::plan::PlannedNode;
use crate::exec::report::{ExecutionReport, RunnerRecord};
use crate::exec::ExecutionContext;
use crate::model::{Component, TargetId};
use crate::runner::{RunnerContext, RunnerInstance};
use crate::toolchain::{self, DispatchArgs, ToolchainDispatcher};
use crate::types::RunnerStatus;

/// Address and environment of one runner invocation.
#[derive(Clone, Copy)]
pub struct RunnerInvocation<'a> {
    pub component: &'a Component,
    pub target: &'a TargetId,
    pub step_index: usize,
    pub runner_index: usize,
    pub instance: &'a RunnerInstance,
    pub dispatcher: Option<&'a dyn ToolchainDispatcher>,
    pub config: &'a Config,
    pub repo_root: &'a Path,
}

/// Run `inv.instance` in-process or through the toolchain dispatcher.
///
/// In-process when the toolchain is active in this environment; otherwise
/// through the dispatcher. Without a dispatcher the runner only runs
/// in-process if `[toolchain].skip_dispatch` is set.
pub fn execute_runner(inv: &RunnerInvocation<'_>) -> Result<()> {
    let toolchain = inv.instance.toolchain.as_str();
    let active = toolchain::is_active(toolchain, &inv.config.toolchain.env_var);

    if active {
        return run_in_process(inv);
    }

    if let Some(dispatcher) = inv.dispatcher {
        let args = DispatchArgs {
            component_dir: inv.component.root.clone(),
            target_id: inv.target.to_string(),
            step_index: inv.step_index,
            runner_index: inv.runner_index,
            runner_id: Some(inv.instance.runner_id.clone()),
            toolchain: toolchain.to_string(),
        };
        return dispatcher.run(inv.repo_root, &args, inv.config);
    }

    if inv.config.toolchain.skip_dispatch {
        warn!(
            target = %inv.target,
            toolchain,
            "toolchain not active and dispatch skipped; running in the current environment"
        );
        return run_in_process(inv);
    }

    Err(RepodagError::Assertion(format!(
        "toolchain '{toolchain}' required by '{}' step {} is not active and no dispatcher is configured",
        inv.target, inv.step_index
    )))
}

fn run_in_process(inv: &RunnerInvocation<'_>) -> Result<()> {
    let _cwd = WorkdirGuard::enter(inv.repo_root)?;
    let ctx = RunnerContext {
        component: inv.component,
        target: inv.target,
        step_index: inv.step_index,
        runner_index: inv.runner_index,
        runner_id: &inv.instance.runner_id,
        toolchain: &inv.instance.toolchain,
        repo_root: inv.repo_root,
        config: inv.config,
    };
    inv.instance
        .runner
        .run(&ctx)
        .map_err(|source| RepodagError::RunnerFailed {
            target: inv.target.to_string(),
            step: inv.step_index,
            runner: inv.runner_index,
            source,
        })
}

#[derive(Debug)]
struct WorkdirState {
    depth: usize,
    previous: Option<PathBuf>,
    current: Option<PathBuf>,
}

static WORKDIR: Mutex<WorkdirState> = Mutex::new(WorkdirState {
    depth: 0,
    previous: None,
    current: None,
});

/// Process-wide working directory switch for in-process runners.
///
/// The first guard changes into the directory, the last one to drop
/// restores the previous directory. Concurrent runners share one directory.
#[derive(Debug)]
pub struct WorkdirGuard {
    _private: (),
}

impl WorkdirGuard {
    pub fn enter(dir: &Path) -> Result<Self> {
        let mut state = WORKDIR.lock().unwrap_or_else(|e| e.into_inner());
        if state.depth == 0 {
            let previous = std::env::current_dir()?;
            std::env::set_current_dir(dir)?;
            state.previous = Some(previous);
            state.current = Some(dir.to_path_buf());
        } else if state.current.as_deref() != Some(dir) {
            warn!(
                requested = %dir.display(),
                active = ?state.current,
                "working directory already switched for another runner"
            );
        }
        state.depth += 1;
        Ok(Self { _private: () })
    }
}

impl Drop for WorkdirGuard {
    fn drop(&mut self) {
        let mut state = WORKDIR.lock().unwrap_or_else(|e| e.into_inner());
        state.depth = state.depth.saturating_sub(1);
        if state.depth == 0 {
            state.current = None;
            if let Some(prev) = state.previous.take() {
                if let Err(err) = std::env::set_current_dir(&prev) {
                    error!(dir = %prev.display(), error = %err, "restoring working directory failed");
                }
            }
        }
    }
}

/// Result of running one node.
#[derive(Debug, Default)]
pub struct NodeOutcome {
    pub report: ExecutionReport,
    pub failed: bool,
}

/// Run every step and runner of `node` in order.
///
/// The first failure cancels the rest of the node; later runners and
/// steps, including ones whose runners failed to construct, are recorded
/// as `NotRun`. Each runner runs on a blocking thread, holding a
/// permit of `permits` when given, and a panic becomes a failure.
pub async fn run_node(
    node: PlannedNode,
    ctx: Arc<ExecutionContext>,
    permits: Option<Arc<Semaphore>>,
) -> NodeOutcome {
    let mut outcome = NodeOutcome::default();
    info!(target = %node.id, priority = node.priority, "running target");

    for step in node.steps {
        let instances = match step.runners {
            Ok(instances) => instances,
            Err(err) if outcome.failed => {
                debug!(target = %node.id, step = step.index, error = %err, "runner construction failed after an earlier failure");
                outcome.report.push(step_not_run(&node.id, step.index));
                continue;
            }
            Err(err) => {
                error!(target = %node.id, step = step.index, error = %err, "runner construction failed");
                record_failure(&mut outcome, &node.id, step.index, None, None, err);
                continue;
            }
        };

        for (runner_index, instance) in instances.into_iter().enumerate() {
            if outcome.failed {
                outcome.report.push(not_run(&node.id, step.index, runner_index, &instance));
                continue;
            }

            let _permit = match &permits {
                Some(sem) => match Arc::clone(sem).acquire_owned().await {
                    Ok(permit) => Some(permit),
                    Err(_) => {
                        let err = RepodagError::Assertion("worker pool closed".to_string());
                        record_failure(&mut outcome, &node.id, step.index, Some(runner_index), Some(&instance), err);
                        continue;
                    }
                },
                None => None,
            };

            debug!(target = %node.id, step = step.index, runner = runner_index, runner_id = %instance.runner_id, "starting runner");
            let result = spawn_runner(
                Arc::clone(&ctx),
                Arc::clone(&node.component),
                node.id.clone(),
                step.index,
                runner_index,
                instance.clone(),
            )
            .await;

            match result {
                Ok(()) => outcome.report.push(RunnerRecord {
                    target: node.id.clone(),
                    step: step.index,
                    runner: Some(runner_index),
                    runner_id: Some(instance.runner_id.clone()),
                    status: RunnerStatus::Success,
                    error: None,
                }),
                Err(err) => {
                    error!(target = %node.id, step = step.index, runner = runner_index, error = %err, "runner failed");
                    record_failure(&mut outcome, &node.id, step.index, Some(runner_index), Some(&instance), err);
                }
            }
        }
    }

    outcome
}

/// `NotRun` records for every runner of a cancelled node.
///
/// Steps whose runners failed to construct are `NotRun` too; only the
/// upstream failure is reported.
pub fn cancelled_node(node: PlannedNode) -> NodeOutcome {
    let mut outcome = NodeOutcome::default();
    info!(target = %node.id, "skipping target; an upstream target failed");

    for step in node.steps {
        match step.runners {
            Ok(instances) => {
                for (i, instance) in instances.iter().enumerate() {
                    outcome.report.push(not_run(&node.id, step.index, i, instance));
                }
            }
            Err(err) => {
                debug!(target = %node.id, step = step.index, error = %err, "runner construction failed for a cancelled target");
                outcome.report.push(step_not_run(&node.id, step.index));
            }
        }
    }
    outcome
}

async fn spawn_runner(
    ctx: Arc<ExecutionContext>,
    component: Arc<Component>,
    target: TargetId,
    step_index: usize,
    runner_index: usize,
    instance: RunnerInstance,
) -> Result<()> {
    let task_target = target.clone();
    let joined = tokio::task::spawn_blocking(move || {
        let inv = RunnerInvocation {
            component: &component,
            target: &task_target,
            step_index,
            runner_index,
            instance: &instance,
            dispatcher: ctx.dispatcher.as_deref(),
            config: &ctx.config,
            repo_root: &ctx.repo_root,
        };
        execute_runner(&inv)
    })
    .await;

    match joined {
        Ok(result) => result,
        Err(join_err) => Err(RepodagError::RunnerFailed {
            target: target.to_string(),
            step: step_index,
            runner: runner_index,
            source: anyhow::anyhow!("runner panicked: {}", panic_message(join_err)),
        }),
    }
}

pub(crate) fn panic_message(err: tokio::task::JoinError) -> String {
    if !err.is_panic() {
        return err.to_string();
    }
    let payload = err.into_panic();
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

fn not_run(target: &TargetId, step: usize, runner: usize, instance: &RunnerInstance) -> RunnerRecord {
    RunnerRecord {
        target: target.clone(),
        step,
        runner: Some(runner),
        runner_id: Some(instance.runner_id.clone()),
        status: RunnerStatus::NotRun,
        error: None,
    }
}

/// `NotRun` record for a step whose runners were never constructed.
fn step_not_run(target: &TargetId, step: usize) -> RunnerRecord {
    RunnerRecord {
        target: target.clone(),
        step,
        runner: None,
        runner_id: None,
        status: RunnerStatus::NotRun,
        error: None,
    }
}

fn record_failure(
    outcome: &mut NodeOutcome,
    target: &TargetId,
    step: usize,
    runner: Option<usize>,
    instance: Option<&RunnerInstance>,
    err: RepodagError,
) {
    outcome.failed = true;
    outcome.report.push(RunnerRecord {
        target: target.clone(),
        step,
        runner,
        runner_id: instance.map(|i| i.runner_id.clone()),
        status: RunnerStatus::Failed,
        error: Some(err.to_string()),
    });
    outcome.report.push_error(err);
}
