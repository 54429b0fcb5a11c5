// src/dag/changes.rs

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use petgraph::graph::NodeIndex;
use tracing::{debug, trace};

use crate::dag::graph::{ResolvedInput, TargetGraph};
use crate::fs::relative_slash_path;
use crate::model::InputId;

/// Change set of one input: matched paths relative to its base, sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct InputMatch {
    paths: Vec<String>,
}

impl InputMatch {
    fn changed(&self) -> bool {
        !self.paths.is_empty()
    }
}

impl TargetGraph {
    /// Propagate changed paths through the closure.
    ///
    /// `None` means everything changed. Relative paths are taken relative to
    /// the repository root. Results of shared inputs are computed once.
    /// Calling this again resets the previous result.
    pub fn compute_changes(&mut self, changed_paths: Option<&[PathBuf]>) {
        for &n in &self.closure {
            self.graph[n].change = Default::default();
        }

        let Some(paths) = changed_paths else {
            for &n in &self.closure {
                self.graph[n].change.changed = true;
            }
            debug!(nodes = self.closure.len(), "no path list given; every target changed");
            return;
        };

        let paths: Vec<PathBuf> = paths
            .iter()
            .map(|p| {
                if p.is_absolute() {
                    p.clone()
                } else {
                    self.root_dir.join(p)
                }
            })
            .collect();

        let mut memo: HashMap<InputId, InputMatch> = HashMap::new();

        for node in self.topological_closure() {
            if !self.graph[node].change.changed_by_dependency {
                let own = self.evaluate_node(node, &paths, &mut memo);
                if !own.is_empty() {
                    trace!(target = %self.graph[node].id, paths = ?own, "target changed by its inputs");
                    self.graph[node].change.mark_self(own);
                }
            }

            if !self.graph[node].change.changed {
                continue;
            }

            let upstream: Vec<String> = {
                let change = &self.graph[node].change;
                change
                    .paths
                    .iter()
                    .chain(change.upstream_paths.iter())
                    .cloned()
                    .collect()
            };
            for dependent in self.sorted_dependents(node) {
                self.graph[dependent]
                    .change
                    .mark_by_dependency(upstream.iter().cloned());
            }
        }

        debug!(
            changed = self.closure.iter().filter(|n| self.graph[**n].change.changed).count(),
            total = self.closure.len(),
            "change propagation finished"
        );
    }

    /// Closure nodes ordered so that every dependency comes before its
    /// dependents: descending priority, then ID.
    pub(crate) fn topological_closure(&self) -> Vec<NodeIndex> {
        let mut order = self.closure.clone();
        order.sort_by(|a, b| {
            let (na, nb) = (&self.graph[*a], &self.graph[*b]);
            nb.priority.cmp(&na.priority).then_with(|| na.id.cmp(&nb.id))
        });
        order
    }

    fn evaluate_node(
        &self,
        node: NodeIndex,
        paths: &[PathBuf],
        memo: &mut HashMap<InputId, InputMatch>,
    ) -> Vec<String> {
        let target = &self.graph[node];

        let ids: Vec<InputId> = if target.inputs.is_empty() {
            vec![InputId::whole_component(&target.component.name)]
        } else {
            target.inputs.clone()
        };

        let mut matched = Vec::new();
        for id in ids {
            let result = memo
                .entry(id.clone())
                .or_insert_with(|| self.evaluate_input(&id, &target.component.root, paths));
            matched.extend(result.paths.iter().cloned());
        }
        matched.sort();
        matched.dedup();
        matched
    }

    fn evaluate_input(&self, id: &InputId, own_root: &Path, paths: &[PathBuf]) -> InputMatch {
        let result = match self.inputs.get(id) {
            Some(ResolvedInput::Component { root }) => match_under(root, paths, |_| true),
            Some(ResolvedInput::Named { input, base_dir }) => {
                match_under(base_dir, paths, |rel| input.matches(rel))
            }
            // Default rule of a target without inputs; the ID names its own
            // component and was never registered.
            None => match_under(own_root, paths, |_| true),
        };
        if result.changed() {
            trace!(input = %id, paths = ?result.paths, "input changed");
        }
        result
    }
}

fn match_under(base: &Path, paths: &[PathBuf], accept: impl Fn(&str) -> bool) -> InputMatch {
    let mut matched: Vec<String> = paths
        .iter()
        .filter_map(|p| relative_slash_path(base, p))
        .filter(|rel| !rel.is_empty() && accept(rel))
        .collect();
    matched.sort();
    matched.dedup();
    InputMatch { paths: matched }
}
