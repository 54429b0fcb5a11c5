// tests/graph_scenarios.rs

mod common;
use crate::common::*;

use repodag::dag::{format_priorities, PrioritySet};
use repodag::errors::RepodagError;

#[test]
fn chain_change_in_middle_component() {
    init_tracing();
    let components = chain_components("");
    let changed = paths(&[MARKER_PATH]);
    let g = graph(&components, None, Some(&changed));

    assert_eq!(
        g.priority_list(),
        vec![
            PrioritySet {
                priority: 1,
                nodes: vec![id("2::build2")],
            },
            PrioritySet {
                priority: 0,
                nodes: vec![id("3::build3")],
            },
        ]
    );

    let build2 = g.change_state(&id("2::build2")).unwrap();
    assert!(build2.changed);
    assert!(!build2.changed_by_dependency);
    assert_eq!(build2.paths, vec!["components/2/!-file-must-match".to_string()]);

    let build3 = g.change_state(&id("3::build3")).unwrap();
    assert!(build3.changed);
    assert!(build3.changed_by_dependency);
    assert!(build3.paths.is_empty());
    assert_eq!(build3.upstream_paths, vec!["components/2/!-file-must-match".to_string()]);

    let build1 = g.change_state(&id("1::build1")).unwrap();
    assert!(!build1.changed);
    assert_eq!(g.priority_of(&id("1::build1")), Some(2));
}

#[test]
fn self_references_are_normalised() {
    let components = vec![
        ComponentBuilder::new("1")
            .input("src", &["^src/.*$"])
            .root_input("marker", &[MARKER_PATTERN])
            .target(TargetBuilder::new("build1").input("self::src"))
            .target(
                TargetBuilder::new("build2")
                    .input("self::marker")
                    .depends("self::build1"),
            )
            .target(
                TargetBuilder::new("build3")
                    .input("self::src")
                    .depends("1::build2")
                    .depends("self::build1"),
            )
            .build(),
    ];
    let changed = paths(&[
        "/repo/components/1/!-file-must-match",
        "/repo/components/1/docs/readme.md",
    ]);
    let g = graph(&components, None, Some(&changed));

    let node = g.node(&id("1::build3")).unwrap();
    assert_eq!(node.depends, vec![id("1::build2"), id("1::build1")]);

    assert_eq!(g.priority_of(&id("1::build1")), Some(2));
    assert_eq!(g.priority_of(&id("1::build2")), Some(1));
    assert_eq!(g.priority_of(&id("1::build3")), Some(0));

    let sets = g.priority_list();
    assert_eq!(sets.len(), 2);
    assert_eq!(sets[0].nodes, vec![id("1::build2")]);
    assert_eq!(sets[1].nodes, vec![id("1::build3")]);

    let build2 = g.change_state(&id("1::build2")).unwrap();
    assert!(build2.changed && !build2.changed_by_dependency);
    let build3 = g.change_state(&id("1::build3")).unwrap();
    assert!(build3.changed_by_dependency);
    assert!(!g.change_state(&id("1::build1")).unwrap().changed);
}

#[test]
fn shared_input_marks_both_targets() {
    let components = vec![
        ComponentBuilder::new("1")
            .input("src", &["^src/.*$"])
            .target(TargetBuilder::new("build").input("self::src"))
            .build(),
        ComponentBuilder::new("2")
            .target(TargetBuilder::new("build").input("1::src"))
            .build(),
    ];
    let changed = paths(&["/repo/components/1/src/file"]);
    let g = graph(&components, None, Some(&changed));

    let sets = g.priority_list();
    assert_eq!(sets.len(), 1);
    assert_eq!(sets[0].nodes, vec![id("1::build"), id("2::build")]);
    assert!(g.dependencies_of(&id("2::build")).is_empty());
    assert!(g.dependents_of(&id("1::build")).is_empty());

    for target in ["1::build", "2::build"] {
        let state = g.change_state(&id(target)).unwrap();
        assert!(state.changed && !state.changed_by_dependency, "{target}");
        assert_eq!(state.paths, vec!["src/file".to_string()]);
    }
}

#[test]
fn qualified_input_key_resolves_by_its_id_name() {
    let components = vec![
        ComponentBuilder::new("web")
            .input("a::b", &["^src/.*$"])
            .target(TargetBuilder::new("pkg::build").input("self::a-b"))
            .target(TargetBuilder::new("pack").depends("web::pkg-build"))
            .build(),
    ];
    let changed = paths(&["/repo/components/web/src/main.go"]);
    let g = graph(&components, None, Some(&changed));

    let build = g.change_state(&id("web::pkg-build")).unwrap();
    assert!(build.changed && !build.changed_by_dependency);
    assert_eq!(build.paths, vec!["src/main.go".to_string()]);
    assert_eq!(g.dependencies_of(&id("web::pack")), vec![&id("web::pkg-build")]);
}

#[test]
fn duplicate_dependencies_are_collapsed() {
    let components = vec![
        ComponentBuilder::new("1")
            .target(TargetBuilder::new("build1"))
            .target(
                TargetBuilder::new("build2")
                    .depends("self::build1")
                    .depends("1::build1"),
            )
            .build(),
    ];
    let g = graph(&components, None, None);

    assert_eq!(g.dependencies_of(&id("1::build2")), vec![&id("1::build1")]);
    assert_eq!(g.node(&id("1::build2")).unwrap().depends, vec![id("1::build1")]);
    assert_eq!(g.priority_of(&id("1::build1")), Some(1));
    assert_eq!(g.priority_of(&id("1::build2")), Some(0));
}

#[test]
fn cycle_is_reported_with_chain() {
    let components = vec![
        ComponentBuilder::new("1")
            .target(TargetBuilder::new("build1").depends("3::build3"))
            .build(),
        ComponentBuilder::new("2")
            .target(TargetBuilder::new("build2").depends("1::build1"))
            .build(),
        ComponentBuilder::new("3")
            .target(
                TargetBuilder::new("build3")
                    .depends("2::build2")
                    .depends("1::build1"),
            )
            .build(),
    ];

    let err = repodag::dag::TargetGraph::new(&components, std::path::Path::new(REPO_ROOT), None)
        .unwrap_err();
    assert!(matches!(err, RepodagError::DagCycle(_)));
    let text = err.to_string();
    assert!(text.contains("contains a cycle"), "{text}");
    assert!(text.contains("1::build1"), "{text}");
    assert!(text.contains("3::build3"), "{text}");
}

#[test]
fn unknown_dependency_is_an_error() {
    let components = vec![
        ComponentBuilder::new("1")
            .target(TargetBuilder::new("build").depends("missing::build"))
            .build(),
    ];
    let err = repodag::dag::TargetGraph::new(&components, std::path::Path::new(REPO_ROOT), None)
        .unwrap_err();
    assert!(matches!(err, RepodagError::UnknownTarget { .. }), "{err}");
}

#[test]
fn unknown_selection_lists_missing_ids() {
    let components = chain_components("");
    let selection = vec![id("9::nope"), id("8::gone")];
    let err = repodag::dag::TargetGraph::new(
        &components,
        std::path::Path::new(REPO_ROOT),
        Some(&selection),
    )
    .unwrap_err();
    match err {
        RepodagError::SelectionNotFound(ids) => {
            assert_eq!(ids.len(), 2);
            assert!(ids.contains(&"9::nope".to_string()));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn empty_selection_gives_empty_list() {
    let components = chain_components("");
    let g = graph(&components, Some(&[]), None);
    assert!(g.priority_list().is_empty());
    assert_eq!(format_priorities(&g.priority_list()), "no targets to run\n");
}

#[test]
fn no_path_list_marks_closure_of_selection() {
    let components = chain_components("");
    let selection = vec![id("2::build2")];
    let g = graph(&components, Some(&selection), None);

    let sets = g.priority_list();
    let listed: Vec<_> = sets.iter().flat_map(|s| s.nodes.clone()).collect();
    assert_eq!(listed, vec![id("1::build1"), id("2::build2")]);
}

#[test]
fn default_rule_uses_component_root() {
    let components = vec![
        ComponentBuilder::new("a")
            .target(TargetBuilder::new("build"))
            .build(),
    ];

    let inside = paths(&["/repo/components/a/src/lib.rs"]);
    let g = graph(&components, None, Some(&inside));
    let state = g.change_state(&id("a::build")).unwrap();
    assert!(state.changed);
    assert_eq!(state.paths, vec!["src/lib.rs".to_string()]);

    let outside = paths(&["/repo/components/b/src/lib.rs", "/elsewhere/file"]);
    let g = graph(&components, None, Some(&outside));
    assert!(!g.change_state(&id("a::build")).unwrap().changed);
    assert!(g.priority_list().is_empty());
}

#[test]
fn relative_changed_paths_are_taken_from_the_root() {
    let components = chain_components("");
    let changed = paths(&["components/2/!-file-must-match"]);
    let g = graph(&components, None, Some(&changed));
    assert!(g.change_state(&id("2::build2")).unwrap().changed);
}

#[test]
fn exclude_overrides_include_for_the_same_path() {
    let components = vec![
        ComponentBuilder::new("a")
            .input("src", &["^src/.*$", "!^src/gen/.*$"])
            .target(TargetBuilder::new("build").input("self::src"))
            .build(),
    ];

    let generated = paths(&["/repo/components/a/src/gen/out.rs"]);
    let g = graph(&components, None, Some(&generated));
    assert!(!g.change_state(&id("a::build")).unwrap().changed);

    let mixed = paths(&["/repo/components/a/src/gen/out.rs", "/repo/components/a/src/main.rs"]);
    let g = graph(&components, None, Some(&mixed));
    assert_eq!(
        g.change_state(&id("a::build")).unwrap().paths,
        vec!["src/main.rs".to_string()]
    );
}

#[test]
fn recomputation_is_stable() {
    let components = chain_components("");
    let changed = paths(&[MARKER_PATH]);
    let mut g = graph(&components, None, Some(&changed));
    let first = g.priority_list();
    let first_state = g.change_state(&id("3::build3")).cloned();

    g.compute_changes(Some(&changed));
    assert_eq!(g.priority_list(), first);
    assert_eq!(g.change_state(&id("3::build3")).cloned(), first_state);

    let rebuilt = graph(&components, None, Some(&changed));
    assert_eq!(rebuilt.priority_list(), first);
}

#[test]
fn bucket_order_is_stage_then_id() {
    let components = vec![
        ComponentBuilder::new("z")
            .target(TargetBuilder::new("lint").stage("lint"))
            .target(TargetBuilder::new("build").stage("build"))
            .build(),
        ComponentBuilder::new("a")
            .target(TargetBuilder::new("test").stage("test"))
            .target(TargetBuilder::new("build").stage("build"))
            .build(),
    ];
    let g = graph(&components, None, None);
    let sets = g.priority_list();
    assert_eq!(sets.len(), 1);
    assert_eq!(
        sets[0].nodes,
        vec![id("z::lint"), id("a::build"), id("z::build"), id("a::test")]
    );
}
