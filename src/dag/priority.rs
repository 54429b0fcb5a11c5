// src/dag/priority.rs

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::fmt::Write as _;

use petgraph::Direction;
use petgraph::graph::NodeIndex;

use crate::dag::graph::TargetGraph;
use crate::model::TargetId;

/// Targets sharing one priority.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrioritySet {
    pub priority: u32,
    /// Ordered by stage priority, then ID.
    pub nodes: Vec<TargetId>,
}

impl TargetGraph {
    /// Changed closure nodes, grouped by priority in descending order.
    ///
    /// Walks forward from the closure's roots (nodes without dependencies),
    /// visiting every node once. Before [`compute_changes`] runs nothing is
    /// changed and the list is empty.
    ///
    /// [`compute_changes`]: TargetGraph::compute_changes
    pub fn priority_list(&self) -> Vec<PrioritySet> {
        let mut queue: VecDeque<NodeIndex> = self
            .closure
            .iter()
            .copied()
            .filter(|n| {
                self.graph
                    .neighbors_directed(*n, Direction::Incoming)
                    .next()
                    .is_none()
            })
            .collect();

        let mut seen = HashSet::new();
        let mut buckets: BTreeMap<u32, Vec<NodeIndex>> = BTreeMap::new();

        while let Some(node) = queue.pop_front() {
            if !seen.insert(node) {
                continue;
            }
            let weight = &self.graph[node];
            if weight.change.changed {
                buckets.entry(weight.priority).or_default().push(node);
            }
            queue.extend(self.sorted_dependents(node));
        }

        buckets
            .into_iter()
            .rev()
            .map(|(priority, mut nodes)| {
                nodes.sort_by(|a, b| {
                    let (na, nb) = (&self.graph[*a], &self.graph[*b]);
                    na.stage_priority()
                        .cmp(&nb.stage_priority())
                        .then_with(|| na.id.cmp(&nb.id))
                });
                PrioritySet {
                    priority,
                    nodes: nodes.into_iter().map(|n| self.graph[n].id.clone()).collect(),
                }
            })
            .collect()
    }
}

/// Human-readable listing, one block per priority:
///
/// ```text
/// priority 1:
///   2::build2
/// priority 0:
///   3::build3
/// ```
pub fn format_priorities(sets: &[PrioritySet]) -> String {
    if sets.is_empty() {
        return "no targets to run\n".to_string();
    }
    let mut out = String::new();
    for set in sets {
        let _ = writeln!(out, "priority {}:", set.priority);
        for id in &set.nodes {
            let _ = writeln!(out, "  {id}");
        }
    }
    out
}
