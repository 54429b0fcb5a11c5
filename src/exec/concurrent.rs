// src/exec/concurrent.rs

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, info, warn};

use crate::errors::RepodagError;
use crate::exec::ExecutionContext;
use crate::exec::execute::{cancelled_node, panic_message, run_node, NodeOutcome};
use crate::exec::flow::{FlowScheduler, NodeResult};
use crate::exec::plan::{ExecutionPlan, PlannedNode};
use crate::exec::report::{ExecutionReport, RunnerRecord};
use crate::types::RunnerStatus;

/// Events sent by node tasks to the flow loop.
#[derive(Debug)]
enum FlowEvent {
    NodeFinished { node: usize, outcome: NodeOutcome },
}

/// Run the plan as a task flow.
///
/// Every node whose dependencies have completed runs as its own task;
/// runner invocations share a pool of `max_parallel` permits. The loop is
/// the only writer of scheduling state and of the report.
pub async fn run_concurrent(
    plan: ExecutionPlan,
    ctx: Arc<ExecutionContext>,
    max_parallel: usize,
) -> ExecutionReport {
    let mut scheduler = FlowScheduler::new(&plan);
    let mut slots: Vec<Option<PlannedNode>> = plan.nodes.into_iter().map(Some).collect();
    let permits = Arc::new(Semaphore::new(max_parallel.max(1)));
    let (tx, mut rx) = mpsc::channel::<FlowEvent>(slots.len().max(1));
    let mut report = ExecutionReport::new();

    info!(nodes = slots.len(), max_parallel, "starting concurrent execution");

    let mut ready: VecDeque<usize> = scheduler.start().into();
    loop {
        // Cancelled nodes complete inline; everything else is spawned.
        while let Some(node) = ready.pop_front() {
            let Some(planned) = slots[node].take() else {
                continue;
            };
            if scheduler.is_cancelled(node) {
                let outcome = cancelled_node(planned);
                report.merge(outcome.report);
                ready.extend(scheduler.complete(node, NodeResult::Cancelled).ready);
            } else {
                spawn_node(node, planned, &ctx, &permits, &tx);
            }
        }

        if scheduler.is_finished() {
            break;
        }

        let Some(event) = rx.recv().await else {
            warn!("flow event channel closed before all targets finished");
            break;
        };

        match event {
            FlowEvent::NodeFinished { node, outcome } => {
                let result = if outcome.failed {
                    NodeResult::Failed
                } else {
                    NodeResult::Succeeded
                };
                debug!(node, ?result, "target finished");
                report.merge(outcome.report);

                let step = scheduler.complete(node, result);
                if !step.newly_cancelled.is_empty() {
                    debug!(cancelled = ?step.newly_cancelled, "cancelling dependents");
                }
                ready.extend(step.ready);
            }
        }
    }

    report
}

fn spawn_node(
    node: usize,
    planned: PlannedNode,
    ctx: &Arc<ExecutionContext>,
    permits: &Arc<Semaphore>,
    tx: &mpsc::Sender<FlowEvent>,
) {
    let target = planned.id.clone();
    let inner = tokio::spawn(run_node(planned, Arc::clone(ctx), Some(Arc::clone(permits))));
    let tx = tx.clone();

    // The outer task turns a panic of the node task into a failed outcome,
    // so the loop always hears back.
    tokio::spawn(async move {
        let outcome = match inner.await {
            Ok(outcome) => outcome,
            Err(join_err) => {
                let message = panic_message(join_err);
                let mut outcome = NodeOutcome {
                    failed: true,
                    ..NodeOutcome::default()
                };
                outcome.report.push(RunnerRecord {
                    target: target.clone(),
                    step: 0,
                    runner: None,
                    runner_id: None,
                    status: RunnerStatus::Failed,
                    error: Some(message.clone()),
                });
                outcome.report.push_error(RepodagError::Assertion(format!(
                    "task of target '{target}' panicked: {message}"
                )));
                outcome
            }
        };
        let _ = tx.send(FlowEvent::NodeFinished { node, outcome }).await;
    });
}
