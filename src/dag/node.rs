// src/dag/node.rs

use std::sync::Arc;

use crate::model::{Component, InputId, Target, TargetId};

/// Change information of one node.
///
/// If `changed_by_dependency` is set, `changed` is set too and `paths` is
/// empty; the paths that triggered the change upstream are kept in
/// `upstream_paths`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeState {
    pub changed: bool,
    pub changed_by_dependency: bool,
    /// Paths matched by this node's own inputs, sorted.
    pub paths: Vec<String>,
    /// Paths matched by changed ancestors, sorted.
    pub upstream_paths: Vec<String>,
}

impl ChangeState {
    pub(crate) fn mark_self(&mut self, paths: Vec<String>) {
        self.changed = true;
        self.paths = paths;
    }

    pub(crate) fn mark_by_dependency(&mut self, upstream: impl IntoIterator<Item = String>) {
        self.changed = true;
        self.changed_by_dependency = true;
        self.paths.clear();
        self.upstream_paths.extend(upstream);
        self.upstream_paths.sort();
        self.upstream_paths.dedup();
    }
}

/// Runtime graph object wrapping one target.
#[derive(Debug, Clone)]
pub struct TargetNode {
    pub id: TargetId,
    pub component: Arc<Component>,
    pub target: Target,
    /// Input references with `self` forms rewritten.
    pub inputs: Vec<InputId>,
    /// Dependencies with `self` forms rewritten, without duplicates.
    pub depends: Vec<TargetId>,
    /// Higher runs earlier.
    pub priority: u32,
    pub change: ChangeState,
}

impl TargetNode {
    pub fn stage_priority(&self) -> i32 {
        self.target.stage_priority
    }
}
