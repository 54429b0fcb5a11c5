// tests/property_graph.rs

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use proptest::prelude::*;
use repodag::dag::TargetGraph;
use repodag::model::{normalize_ref, Component, TargetId};
use repodag_test_utils::builders::{ComponentBuilder, TargetBuilder, REPO_ROOT};

/// Target `i` may only depend on targets `0..i`, so the graph is acyclic.
/// Targets are spread over three components.
fn dag_strategy(max_targets: usize) -> impl Strategy<Value = Vec<Vec<usize>>> {
    (1..=max_targets).prop_flat_map(|n| {
        proptest::collection::vec(proptest::collection::vec(any::<usize>(), 0..4), n).prop_map(
            |raw| {
                raw.into_iter()
                    .enumerate()
                    .map(|(i, deps)| {
                        let mut valid: Vec<usize> = if i == 0 {
                            Vec::new()
                        } else {
                            deps.into_iter().map(|d| d % i).collect()
                        };
                        valid.sort_unstable();
                        valid.dedup();
                        valid
                    })
                    .collect()
            },
        )
    })
}

fn component_of(i: usize) -> String {
    format!("c{}", i % 3)
}

fn target_id(i: usize) -> String {
    format!("{}::t{i}", component_of(i))
}

fn build_components(deps: &[Vec<usize>], extra_edge: Option<(usize, usize)>) -> Vec<Arc<Component>> {
    let mut builders: Vec<ComponentBuilder> =
        (0..3).map(|c| ComponentBuilder::new(&format!("c{c}"))).collect();
    for (i, ds) in deps.iter().enumerate() {
        let mut target = TargetBuilder::new(&format!("t{i}"));
        for &d in ds {
            target = target.depends(&target_id(d));
        }
        if let Some((from, to)) = extra_edge {
            if from == i {
                target = target.depends(&target_id(to));
            }
        }
        let c = i % 3;
        let builder = std::mem::replace(&mut builders[c], ComponentBuilder::new("placeholder"));
        builders[c] = builder.target(target);
    }
    builders.into_iter().map(ComponentBuilder::build).collect()
}

fn has_path(deps: &[Vec<usize>], from: usize, to: usize) -> bool {
    // Is `to` reachable from `from` following dependency edges?
    let mut stack = vec![from];
    let mut seen = HashSet::new();
    while let Some(n) = stack.pop() {
        if n == to {
            return true;
        }
        if seen.insert(n) {
            stack.extend(deps[n].iter().copied());
        }
    }
    false
}

proptest! {
    #[test]
    fn dependencies_run_strictly_earlier(deps in dag_strategy(12)) {
        let components = build_components(&deps, None);
        let graph = TargetGraph::new(&components, Path::new(REPO_ROOT), None).unwrap();

        for (i, ds) in deps.iter().enumerate() {
            let p = graph.priority_of(&TargetId::parse(&target_id(i)).unwrap()).unwrap();
            for &d in ds {
                let pd = graph.priority_of(&TargetId::parse(&target_id(d)).unwrap()).unwrap();
                prop_assert!(pd >= p + 1, "{} ({pd}) must outrank {} ({p})", target_id(d), target_id(i));
            }
        }
    }

    #[test]
    fn cycle_detection_matches_reachability(
        deps in dag_strategy(10),
        from in any::<usize>(),
        to in any::<usize>(),
    ) {
        let n = deps.len();
        let (from, to) = (from % n, to % n);
        let components = build_components(&deps, Some((from, to)));
        let result = TargetGraph::new(&components, Path::new(REPO_ROOT), None);

        // Adding `from -> to` closes a cycle iff `from` is reachable from `to`.
        let cyclic = from == to || has_path(&deps, to, from);
        prop_assert_eq!(result.is_err(), cyclic);
    }

    #[test]
    fn change_propagates_to_every_dependent(
        deps in dag_strategy(10),
        touched in proptest::collection::vec(any::<usize>(), 0..3),
    ) {
        let n = deps.len();
        let touched: HashSet<usize> = touched.into_iter().map(|t| t % n).collect();
        let components = build_components(&deps, None);
        let mut graph = TargetGraph::new(&components, Path::new(REPO_ROOT), None).unwrap();

        // Targets have no inputs, so a path under a component root touches
        // every target of that component.
        let touched_components: HashSet<String> = touched.iter().map(|&t| component_of(t)).collect();
        let changed: Vec<PathBuf> = touched_components
            .iter()
            .map(|c| PathBuf::from(format!("{REPO_ROOT}/components/{c}/file")))
            .collect();
        graph.compute_changes(Some(&changed));

        let mut expected: HashMap<usize, bool> = HashMap::new();
        for i in 0..n {
            let own = touched_components.contains(&component_of(i));
            let upstream = (0..n).any(|j| {
                j != i && touched_components.contains(&component_of(j)) && has_path(&deps, i, j)
            });
            expected.insert(i, own || upstream);
        }

        for i in 0..n {
            let state = graph.change_state(&TargetId::parse(&target_id(i)).unwrap()).unwrap();
            prop_assert_eq!(state.changed, expected[&i], "target {}", target_id(i));
        }
    }

    #[test]
    fn reference_normalisation_is_idempotent(
        name in "[a-z][a-z0-9_-]{0,8}",
        form in 0..4u8,
        component in "[a-z][a-z0-9]{0,6}",
    ) {
        let raw = match form {
            0 => "self".to_string(),
            1 => format!("self::{name}"),
            2 => name.clone(),
            _ => format!("{component}::{name}"),
        };
        let once = normalize_ref(&raw, &component);
        let twice = normalize_ref(&once, &component);
        prop_assert_eq!(once, twice);
    }
}
