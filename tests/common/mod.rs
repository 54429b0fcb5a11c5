#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use repodag::config::Config;
use repodag::dag::TargetGraph;
use repodag::exec::{self, ExecutionContext, ExecutionPlan, ExecutionReport};
use repodag::model::{Component, TargetId};
use repodag::runner::RunnerRegistry;
use repodag::tags::TagSet;
use repodag::toolchain::ToolchainDispatcher;

pub use repodag_test_utils::builders::{
    step, ComponentBuilder, ConfigBuilder, TargetBuilder, REPO_ROOT,
};
pub use repodag_test_utils::init_tracing;
pub use repodag_test_utils::runners::{
    probe_registry, register_probe, Journal, RecordingDispatcher, PROBE_RUNNER_ID,
};

/// Root-relative marker input of the chain fixtures.
pub const MARKER_PATTERN: &str = "^components/.*/!-file-must-.*$";
pub const MARKER_PATH: &str = "/repo/components/2/!-file-must-match";

pub fn id(raw: &str) -> TargetId {
    TargetId::parse(raw).unwrap()
}

pub fn paths(raw: &[&str]) -> Vec<PathBuf> {
    raw.iter().map(PathBuf::from).collect()
}

/// Components `1`, `2`, `3` with `1::build1 <- 2::build2 <- 3::build3` and
/// `3::build3` also depending on `1::build1`.
///
/// Every step runs the probe runner with `probe_config`.
pub fn chain_components(probe_config: &str) -> Vec<Arc<Component>> {
    vec![
        ComponentBuilder::new("1")
            .target(TargetBuilder::new("build1").runner(PROBE_RUNNER_ID, probe_config))
            .build(),
        ComponentBuilder::new("2")
            .root_input("marker", &[MARKER_PATTERN])
            .target(
                TargetBuilder::new("build2")
                    .input("self::marker")
                    .depends("1::build1")
                    .runner(PROBE_RUNNER_ID, probe_config),
            )
            .build(),
        ComponentBuilder::new("3")
            .target(
                TargetBuilder::new("build3")
                    .depends("2::build2")
                    .depends("1::build1")
                    .runner(PROBE_RUNNER_ID, probe_config),
            )
            .build(),
    ]
}

pub fn graph(
    components: &[Arc<Component>],
    selection: Option<&[TargetId]>,
    changed: Option<&[PathBuf]>,
) -> TargetGraph {
    let mut graph = TargetGraph::new(components, Path::new(REPO_ROOT), selection).unwrap();
    graph.compute_changes(changed);
    graph
}

/// Plan and execute the changed part of `graph`.
///
/// Runners execute with the system temp dir as repository root.
pub async fn execute_graph(
    graph: &TargetGraph,
    registry: &RunnerRegistry,
    config: Config,
    dispatcher: Option<Arc<dyn ToolchainDispatcher>>,
) -> ExecutionReport {
    let sets = graph.priority_list();
    let tags = TagSet::new(&config.execution.tags);
    let plan = ExecutionPlan::build(graph, &sets, registry, &tags).unwrap();
    let ctx = Arc::new(ExecutionContext {
        config,
        dispatcher,
        repo_root: std::env::temp_dir(),
    });
    exec::execute(plan, ctx).await
}
