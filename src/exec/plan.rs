// src/exec/plan.rs

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use crate::dag::{PrioritySet, TargetGraph};
use crate::errors::{RepodagError, Result};
use crate::model::{Component, TargetId};
use crate::runner::{RunnerInstance, RunnerRegistry};
use crate::tags::TagSet;

/// One step with its runner instances already built.
#[derive(Debug)]
pub struct PlannedStep {
    pub index: usize,
    /// Construction failures are kept and reported as the step's status.
    pub runners: Result<Vec<RunnerInstance>>,
}

/// A target ready to execute.
#[derive(Debug)]
pub struct PlannedNode {
    pub id: TargetId,
    pub component: Arc<Component>,
    pub priority: u32,
    pub steps: Vec<PlannedStep>,
    /// Indices of planned dependencies.
    pub dependencies: Vec<usize>,
    /// Indices of planned dependents.
    pub dependents: Vec<usize>,
}

/// Arena of planned nodes plus the priority order they were listed in.
#[derive(Debug, Default)]
pub struct ExecutionPlan {
    pub nodes: Vec<PlannedNode>,
    /// Node indices, one bucket per priority, descending.
    pub buckets: Vec<Vec<usize>>,
}

impl ExecutionPlan {
    /// Build the plan for `sets`, filtering steps by `tags` and creating
    /// runner instances for the remaining ones.
    pub fn build(
        graph: &TargetGraph,
        sets: &[PrioritySet],
        registry: &RunnerRegistry,
        tags: &TagSet,
    ) -> Result<Self> {
        let mut plan = ExecutionPlan::default();
        let mut index: HashMap<TargetId, usize> = HashMap::new();

        for set in sets {
            let mut bucket = Vec::with_capacity(set.nodes.len());
            for id in &set.nodes {
                let node = graph.node(id).ok_or_else(|| {
                    RepodagError::Assertion(format!("listed target '{id}' is not in the graph"))
                })?;

                let mut steps = Vec::with_capacity(node.target.steps.len());
                for step in &node.target.steps {
                    if !step.is_included(tags) {
                        info!(
                            target = %id,
                            step = step.index,
                            expr = %step.include.as_ref().map(|e| e.source()).unwrap_or_default(),
                            "step excluded by tag expression"
                        );
                        continue;
                    }
                    steps.push(PlannedStep {
                        index: step.index,
                        runners: registry.create_for_step(&node.target.stage, step),
                    });
                }

                let idx = plan.nodes.len();
                plan.nodes.push(PlannedNode {
                    id: id.clone(),
                    component: Arc::clone(&node.component),
                    priority: set.priority,
                    steps,
                    dependencies: Vec::new(),
                    dependents: Vec::new(),
                });
                index.insert(id.clone(), idx);
                bucket.push(idx);
            }
            plan.buckets.push(bucket);
        }

        for idx in 0..plan.nodes.len() {
            let deps: Vec<usize> = graph
                .dependencies_of(&plan.nodes[idx].id)
                .into_iter()
                .filter_map(|dep| index.get(dep).copied())
                .collect();
            for &dep in &deps {
                plan.nodes[dep].dependents.push(idx);
            }
            plan.nodes[idx].dependencies = deps;
        }

        debug!(
            nodes = plan.nodes.len(),
            priorities = plan.buckets.len(),
            "execution plan built"
        );
        Ok(plan)
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }
}
