// src/dag/graph.rs

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use tracing::{debug, info};

use crate::dag::node::{ChangeState, TargetNode};
use crate::errors::{combine, RepodagError, Result};
use crate::model::{normalize_ref, Component, Input, InputId, TargetId};

/// What an input ID resolved to.
#[derive(Debug, Clone)]
pub(crate) enum ResolvedInput {
    /// A bare component name: "anything under the component root".
    Component { root: PathBuf },
    /// A named input, matched relative to `base_dir`.
    Named { input: Input, base_dir: PathBuf },
}

/// Dependency graph of all loaded targets.
///
/// Edge direction: dependency -> dependent. For
///
/// ```yaml
/// targets:
///   b:
///     depends: [self::a]
/// ```
///
/// the graph holds the edge `a -> b`. Only targets reachable from the
/// selection through their dependencies (the *closure*) get edges,
/// priorities and change states.
#[derive(Debug, Clone)]
pub struct TargetGraph {
    pub(crate) graph: DiGraph<TargetNode, ()>,
    pub(crate) index: HashMap<TargetId, NodeIndex>,
    pub(crate) inputs: HashMap<InputId, ResolvedInput>,
    pub(crate) root_dir: PathBuf,
    /// Selected nodes, sorted by ID.
    pub(crate) selection: Vec<NodeIndex>,
    /// Selection plus all transitive dependencies, sorted by ID.
    pub(crate) closure: Vec<NodeIndex>,
}

impl TargetGraph {
    /// Build the graph for `components`.
    ///
    /// `selection` restricts the closure to the given targets and their
    /// dependencies; `None` selects every target.
    pub fn new(
        components: &[Arc<Component>],
        root_dir: &Path,
        selection: Option<&[TargetId]>,
    ) -> Result<Self> {
        let mut graph = Self {
            graph: DiGraph::new(),
            index: HashMap::new(),
            inputs: HashMap::new(),
            root_dir: root_dir.to_path_buf(),
            selection: Vec::new(),
            closure: Vec::new(),
        };

        graph.add_nodes(components)?;
        graph.resolve_inputs(components)?;
        graph.select(selection)?;
        graph.link_edges()?;
        graph.check_cycles()?;
        graph.assign_priorities();

        info!(
            nodes = graph.graph.node_count(),
            closure = graph.closure.len(),
            edges = graph.graph.edge_count(),
            "target graph built"
        );
        Ok(graph)
    }

    fn add_nodes(&mut self, components: &[Arc<Component>]) -> Result<()> {
        let mut errors = None;

        for component in components {
            for target in component.targets.values() {
                let mut depends = Vec::new();
                for raw in &target.depends {
                    let normalized = normalize_ref(raw, &component.name);
                    match TargetId::parse(&normalized) {
                        Ok(id) if depends.contains(&id) => {
                            debug!(target = %target.id, dependency = %id, "ignoring duplicate dependency");
                        }
                        Ok(id) => depends.push(id),
                        Err(_) => {
                            let err = RepodagError::UnknownTarget {
                                target: target.id.to_string(),
                                dependency: raw.clone(),
                            };
                            errors = Some(combine(errors, err));
                        }
                    }
                }

                let mut inputs = Vec::new();
                for raw in &target.inputs {
                    let normalized = normalize_ref(raw, &component.name);
                    match InputId::parse(&normalized) {
                        Ok(id) if inputs.contains(&id) => {}
                        Ok(id) => inputs.push(id),
                        Err(_) => {
                            let err = RepodagError::UnknownInput {
                                target: target.id.to_string(),
                                input: raw.clone(),
                            };
                            errors = Some(combine(errors, err));
                        }
                    }
                }

                let node = TargetNode {
                    id: target.id.clone(),
                    component: Arc::clone(component),
                    target: target.clone(),
                    inputs,
                    depends,
                    priority: 0,
                    change: ChangeState::default(),
                };
                let idx = self.graph.add_node(node);
                if self.index.insert(target.id.clone(), idx).is_some() {
                    let err = RepodagError::ConfigError(format!(
                        "target '{}' is defined more than once",
                        target.id
                    ));
                    errors = Some(combine(errors, err));
                }
            }
        }

        errors.map_or(Ok(()), Err)
    }

    fn resolve_inputs(&mut self, components: &[Arc<Component>]) -> Result<()> {
        let by_name: HashMap<&str, &Arc<Component>> =
            components.iter().map(|c| (c.name.as_str(), c)).collect();
        let mut errors = None;

        for node in self.graph.node_weights() {
            for id in &node.inputs {
                if self.inputs.contains_key(id) {
                    continue;
                }
                let resolved = by_name.get(id.component()).and_then(|component| match id.input() {
                    None => Some(ResolvedInput::Component {
                        root: component.root.clone(),
                    }),
                    Some(name) => component.input(name).map(|input| ResolvedInput::Named {
                        base_dir: if input.rel_to_root {
                            self.root_dir.clone()
                        } else {
                            component.root.clone()
                        },
                        input: input.clone(),
                    }),
                });

                match resolved {
                    Some(resolved) => {
                        self.inputs.insert(id.clone(), resolved);
                    }
                    None => {
                        let err = RepodagError::UnknownInput {
                            target: node.id.to_string(),
                            input: id.to_string(),
                        };
                        errors = Some(combine(errors, err));
                    }
                }
            }
        }

        errors.map_or(Ok(()), Err)
    }

    fn select(&mut self, selection: Option<&[TargetId]>) -> Result<()> {
        let mut selected = match selection {
            None => self.index.values().copied().collect::<Vec<_>>(),
            Some(ids) => {
                let missing: Vec<String> = ids
                    .iter()
                    .filter(|id| !self.index.contains_key(*id))
                    .map(ToString::to_string)
                    .collect();
                if !missing.is_empty() {
                    return Err(RepodagError::SelectionNotFound(missing));
                }
                ids.iter().map(|id| self.index[id]).collect()
            }
        };

        selected.sort_by(|a, b| self.graph[*a].id.cmp(&self.graph[*b].id));
        selected.dedup();
        self.selection = selected;
        Ok(())
    }

    /// DFS from the selection, linking each visited node to its dependencies.
    fn link_edges(&mut self) -> Result<()> {
        let mut visited = HashSet::new();
        let mut stack: Vec<NodeIndex> = self.selection.iter().rev().copied().collect();
        let mut errors = None;

        while let Some(node) = stack.pop() {
            if !visited.insert(node) {
                continue;
            }
            let depends = self.graph[node].depends.clone();
            for dep in depends {
                match self.index.get(&dep) {
                    Some(&dep_idx) => {
                        self.graph.update_edge(dep_idx, node, ());
                        if !visited.contains(&dep_idx) {
                            stack.push(dep_idx);
                        }
                    }
                    None => {
                        let err = RepodagError::UnknownTarget {
                            target: self.graph[node].id.to_string(),
                            dependency: dep.to_string(),
                        };
                        errors = Some(combine(errors, err));
                    }
                }
            }
        }

        if let Some(err) = errors {
            return Err(err);
        }

        let mut closure: Vec<NodeIndex> = visited.into_iter().collect();
        closure.sort_by(|a, b| self.graph[*a].id.cmp(&self.graph[*b].id));
        self.closure = closure;
        Ok(())
    }

    /// Path-tracking DFS along dependencies from every closure node.
    fn check_cycles(&self) -> Result<()> {
        #[derive(Clone, Copy, PartialEq, Eq)]
        enum Mark {
            OnPath,
            Done,
        }

        let mut marks: HashMap<NodeIndex, Mark> = HashMap::new();

        for &start in &self.closure {
            if marks.contains_key(&start) {
                continue;
            }

            marks.insert(start, Mark::OnPath);
            let mut stack = vec![(start, self.sorted_dependencies(start), 0usize)];

            loop {
                let Some(top) = stack.last_mut() else {
                    break;
                };
                if top.2 >= top.1.len() {
                    marks.insert(top.0, Mark::Done);
                    stack.pop();
                    continue;
                }
                let next = top.1[top.2];
                top.2 += 1;

                match marks.get(&next) {
                    Some(Mark::Done) => {}
                    Some(Mark::OnPath) => {
                        let from = stack.iter().position(|(n, _, _)| *n == next).unwrap_or(0);
                        let mut trace: Vec<String> = stack[from..]
                            .iter()
                            .map(|(n, _, _)| self.graph[*n].id.to_string())
                            .collect();
                        trace.push(self.graph[next].id.to_string());
                        return Err(RepodagError::DagCycle(format!("  {}", trace.join(" -> "))));
                    }
                    None => {
                        marks.insert(next, Mark::OnPath);
                        stack.push((next, self.sorted_dependencies(next), 0));
                    }
                }
            }
        }
        Ok(())
    }

    /// BFS from the leaves (no dependents) walking towards dependencies.
    ///
    /// Every dependency ends up at least one above each of its dependents.
    fn assign_priorities(&mut self) {
        let mut queue: VecDeque<NodeIndex> = self
            .closure
            .iter()
            .copied()
            .filter(|n| {
                self.graph
                    .neighbors_directed(*n, Direction::Outgoing)
                    .next()
                    .is_none()
            })
            .collect();

        for &n in &self.closure {
            self.graph[n].priority = 0;
        }

        while let Some(node) = queue.pop_front() {
            let raised = self.graph[node].priority + 1;
            let deps: Vec<NodeIndex> = self
                .graph
                .neighbors_directed(node, Direction::Incoming)
                .collect();
            for dep in deps {
                if self.graph[dep].priority < raised {
                    self.graph[dep].priority = raised;
                    queue.push_back(dep);
                }
            }
        }
    }

    pub(crate) fn sorted_dependencies(&self, node: NodeIndex) -> Vec<NodeIndex> {
        let mut deps: Vec<NodeIndex> = self
            .graph
            .neighbors_directed(node, Direction::Incoming)
            .collect();
        deps.sort_by(|a, b| self.graph[*a].id.cmp(&self.graph[*b].id));
        deps
    }

    pub(crate) fn sorted_dependents(&self, node: NodeIndex) -> Vec<NodeIndex> {
        let mut deps: Vec<NodeIndex> = self
            .graph
            .neighbors_directed(node, Direction::Outgoing)
            .collect();
        deps.sort_by(|a, b| self.graph[*a].id.cmp(&self.graph[*b].id));
        deps
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// Any loaded node, inside the closure or not.
    pub fn node(&self, id: &TargetId) -> Option<&TargetNode> {
        self.index.get(id).map(|idx| &self.graph[*idx])
    }

    pub fn contains(&self, id: &TargetId) -> bool {
        self.index.contains_key(id)
    }

    /// Nodes in the closure, sorted by ID.
    pub fn closure_nodes(&self) -> impl Iterator<Item = &TargetNode> {
        self.closure.iter().map(|idx| &self.graph[*idx])
    }

    pub fn selected_ids(&self) -> Vec<&TargetId> {
        self.selection.iter().map(|idx| &self.graph[*idx].id).collect()
    }

    /// Direct dependencies of `id` inside the closure, sorted.
    pub fn dependencies_of(&self, id: &TargetId) -> Vec<&TargetId> {
        self.index
            .get(id)
            .map(|idx| {
                self.sorted_dependencies(*idx)
                    .into_iter()
                    .map(|n| &self.graph[n].id)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Direct dependents of `id` inside the closure, sorted.
    pub fn dependents_of(&self, id: &TargetId) -> Vec<&TargetId> {
        self.index
            .get(id)
            .map(|idx| {
                self.sorted_dependents(*idx)
                    .into_iter()
                    .map(|n| &self.graph[n].id)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn priority_of(&self, id: &TargetId) -> Option<u32> {
        self.node(id).map(|n| n.priority)
    }

    pub fn change_state(&self, id: &TargetId) -> Option<&ChangeState> {
        self.node(id).map(|n| &n.change)
    }

    /// All component names referenced by closure nodes.
    pub fn component_names(&self) -> BTreeSet<&str> {
        self.closure_nodes().map(|n| n.component.name.as_str()).collect()
    }
}
