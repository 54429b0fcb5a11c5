// src/exec/sequential.rs

use std::sync::Arc;

use tracing::debug;

use crate::exec::ExecutionContext;
use crate::exec::execute::{cancelled_node, run_node};
use crate::exec::plan::ExecutionPlan;
use crate::exec::report::ExecutionReport;

/// Run the plan one node at a time, priority bucket by bucket.
///
/// A node whose dependency failed (or was itself skipped) is skipped and
/// its runners recorded as `NotRun`.
pub async fn run_sequential(plan: ExecutionPlan, ctx: Arc<ExecutionContext>) -> ExecutionReport {
    let dependents: Vec<Vec<usize>> = plan.nodes.iter().map(|n| n.dependents.clone()).collect();
    let mut cancelled = vec![false; plan.nodes.len()];
    let mut slots: Vec<Option<_>> = plan.nodes.into_iter().map(Some).collect();
    let mut report = ExecutionReport::new();

    for (bucket_no, bucket) in plan.buckets.iter().enumerate() {
        debug!(bucket = bucket_no, nodes = bucket.len(), "running priority bucket");
        for &idx in bucket {
            let Some(node) = slots[idx].take() else {
                continue;
            };

            let skip = cancelled[idx];
            let outcome = if skip {
                cancelled_node(node)
            } else {
                run_node(node, Arc::clone(&ctx), None).await
            };

            if skip || outcome.failed {
                for &d in &dependents[idx] {
                    cancelled[d] = true;
                }
            }
            report.merge(outcome.report);
        }
    }

    report
}
