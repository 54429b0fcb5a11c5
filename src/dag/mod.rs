// src/dag/mod.rs

//! Target dependency graph.
//!
//! Building a [`TargetGraph`] runs these phases in order:
//!
//! 1. one node per target, with `self` references rewritten
//! 2. input resolution (every input ID must name a component or an input)
//! 3. edges, by DFS from the selection through declared dependencies
//! 4. cycle detection with a readable trace
//! 5. priorities: a dependency always sits above its dependents
//!
//! [`TargetGraph::compute_changes`] then marks changed nodes, and
//! [`TargetGraph::priority_list`] groups them for execution.

mod changes;
mod graph;
mod node;
mod priority;

pub use graph::TargetGraph;
pub use node::{ChangeState, TargetNode};
pub use priority::{format_priorities, PrioritySet};
