// src/exec/flow.rs

//! Pure task-flow state for concurrent execution.
//!
//! No IO happens here: the async loop in [`super::concurrent`] reports
//! completions and gets back the nodes that became ready. That keeps the
//! ordering and cancellation rules testable step by step.

use tracing::debug;

use crate::exec::plan::ExecutionPlan;

/// Per-node state within one execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRunState {
    /// Waiting for dependencies.
    Pending,
    /// Handed out as ready, not yet completed.
    Running,
    Succeeded,
    Failed,
    /// Never ran because an upstream node failed or was cancelled.
    Cancelled,
}

impl NodeRunState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            NodeRunState::Succeeded | NodeRunState::Failed | NodeRunState::Cancelled
        )
    }
}

/// How a handed-out node ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeResult {
    Succeeded,
    Failed,
    Cancelled,
}

/// Result of one [`FlowScheduler::complete`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlowStep {
    /// Nodes whose dependencies are now all complete, sorted.
    pub ready: Vec<usize>,
    /// Dependents newly flagged as cancelled, sorted.
    pub newly_cancelled: Vec<usize>,
}

#[derive(Debug, Clone)]
struct FlowNode {
    remaining: usize,
    dependents: Vec<usize>,
    state: NodeRunState,
    cancelled: bool,
}

/// Successor-counting scheduler over an [`ExecutionPlan`].
#[derive(Debug, Clone)]
pub struct FlowScheduler {
    nodes: Vec<FlowNode>,
    completed: usize,
}

impl FlowScheduler {
    pub fn new(plan: &ExecutionPlan) -> Self {
        let nodes = plan
            .nodes
            .iter()
            .map(|n| FlowNode {
                remaining: n.dependencies.len(),
                dependents: n.dependents.clone(),
                state: NodeRunState::Pending,
                cancelled: false,
            })
            .collect();
        Self {
            nodes,
            completed: 0,
        }
    }

    /// Nodes without dependencies; they are marked running.
    pub fn start(&mut self) -> Vec<usize> {
        let ready: Vec<usize> = (0..self.nodes.len())
            .filter(|&i| self.nodes[i].remaining == 0 && self.nodes[i].state == NodeRunState::Pending)
            .collect();
        for &i in &ready {
            self.nodes[i].state = NodeRunState::Running;
        }
        ready
    }

    /// Record the end of `node` and release its dependents.
    ///
    /// A failed or cancelled node cancels its direct dependents; they in
    /// turn cancel theirs when they complete.
    pub fn complete(&mut self, node: usize, result: NodeResult) -> FlowStep {
        let mut step = FlowStep::default();
        let Some(entry) = self.nodes.get_mut(node) else {
            return step;
        };
        if entry.state != NodeRunState::Running {
            debug!(node, state = ?entry.state, "ignoring completion of a node that is not running");
            return step;
        }

        entry.state = match result {
            NodeResult::Succeeded => NodeRunState::Succeeded,
            NodeResult::Failed => NodeRunState::Failed,
            NodeResult::Cancelled => NodeRunState::Cancelled,
        };
        self.completed += 1;

        let propagate_cancel = result != NodeResult::Succeeded;
        let dependents = entry.dependents.clone();
        for dep in dependents {
            let d = &mut self.nodes[dep];
            if propagate_cancel && !d.cancelled {
                d.cancelled = true;
                step.newly_cancelled.push(dep);
            }
            d.remaining = d.remaining.saturating_sub(1);
            if d.remaining == 0 && d.state == NodeRunState::Pending {
                d.state = NodeRunState::Running;
                step.ready.push(dep);
            }
        }

        step.ready.sort_unstable();
        step.newly_cancelled.sort_unstable();
        step
    }

    pub fn is_cancelled(&self, node: usize) -> bool {
        self.nodes.get(node).is_some_and(|n| n.cancelled)
    }

    pub fn state_of(&self, node: usize) -> Option<NodeRunState> {
        self.nodes.get(node).map(|n| n.state)
    }

    pub fn is_finished(&self) -> bool {
        self.completed == self.nodes.len()
    }
}
