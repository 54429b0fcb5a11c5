// src/engine/orchestrator.rs

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info};

use crate::config::Config;
use crate::dag::{format_priorities, PrioritySet, TargetGraph};
use crate::discovery::{self, ComponentFilter, Discovered, DiscoveryOptions};
use crate::engine::selection::TargetSelector;
use crate::errors::{Result, RepodagError};
use crate::exec::{self, ExecutionContext, ExecutionPlan, ExecutionReport};
use crate::git;
use crate::matcher::GlobFilter;
use crate::model::StageTable;
use crate::runner::{shell, RunnerRegistry};
use crate::tags::TagSet;
use crate::toolchain::{CommandDispatcher, ToolchainDispatcher};

/// Where the changed-path list comes from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ChangeSource {
    /// Treat every target as changed.
    #[default]
    Everything,
    Paths(Vec<PathBuf>),
    /// `git diff` against this ref, plus untracked files.
    GitSince(String),
}

/// One `run` invocation.
#[derive(Debug, Clone, Default)]
pub struct RunRequest {
    /// Component name globs; `!` excludes. Empty selects all.
    pub components: Vec<String>,
    pub selector: TargetSelector,
    pub changes: ChangeSource,
    /// Stop after computing the priority list.
    pub dry_run: bool,
}

#[derive(Debug)]
pub struct RunOutcome {
    pub priorities: Vec<PrioritySet>,
    /// `None` for dry runs.
    pub report: Option<ExecutionReport>,
}

impl RunOutcome {
    /// The combined error of all failed runners, if any.
    pub fn into_result(mut self) -> Result<Vec<PrioritySet>> {
        match self.report.as_mut().and_then(|r| r.take_error()) {
            Some(err) => Err(err),
            None => Ok(self.priorities),
        }
    }
}

/// Discovery, graph, planning and execution wired together.
pub struct Orchestrator {
    config: Config,
    registry: RunnerRegistry,
    dispatcher: Option<Arc<dyn ToolchainDispatcher>>,
    discovery: DiscoveryOptions,
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("root_dir", &self.config.root_dir)
            .field("registry", &self.registry)
            .field("has_dispatcher", &self.dispatcher.is_some())
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Orchestrator with the built-in runners and the configured dispatcher.
    pub fn new(config: Config) -> Result<Self> {
        let mut registry = RunnerRegistry::new();
        shell::register(&mut registry, &StageTable::from_config(&config.stages))?;

        let dispatcher = CommandDispatcher::from_config(&config.toolchain)?
            .map(|d| Arc::new(d) as Arc<dyn ToolchainDispatcher>);

        Ok(Self {
            discovery: DiscoveryOptions::from_config(&config),
            config,
            registry,
            dispatcher,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Add runners before running.
    pub fn registry_mut(&mut self) -> &mut RunnerRegistry {
        &mut self.registry
    }

    pub fn with_dispatcher(mut self, dispatcher: Option<Arc<dyn ToolchainDispatcher>>) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    pub fn with_discovery(mut self, discovery: DiscoveryOptions) -> Self {
        self.discovery = discovery;
        self
    }

    pub async fn discover(&self, component_patterns: &[String]) -> Result<Discovered> {
        let filter = if component_patterns.is_empty() {
            ComponentFilter::All
        } else {
            ComponentFilter::Patterns(GlobFilter::new(component_patterns)?)
        };
        let opts = self.discovery.clone().with_filter(filter);
        discovery::find(&self.config.root_dir, &opts).await
    }

    /// Build the graph for `request` and propagate its changes.
    pub async fn graph(&self, request: &RunRequest) -> Result<TargetGraph> {
        let found = self.discover(&request.components).await?;
        let all_selected = request.components.is_empty();
        let selection = request.selector.resolve(&found.selected, all_selected)?;

        let mut graph = TargetGraph::new(&found.all, &self.config.root_dir, selection.as_deref())?;

        let changed = match &request.changes {
            ChangeSource::Everything => None,
            ChangeSource::Paths(paths) => Some(paths.clone()),
            ChangeSource::GitSince(since) => {
                let root = self.config.root_dir.clone();
                let since = since.clone();
                let files = tokio::task::spawn_blocking(move || git::changed_files(&root, &since))
                    .await
                    .map_err(|e| RepodagError::Other(anyhow::anyhow!("git task failed: {e}")))??;
                Some(files)
            }
        };
        debug!(paths = ?changed.as_ref().map(Vec::len), "computing changes");
        graph.compute_changes(changed.as_deref());
        Ok(graph)
    }

    /// Full invocation: discover, build the graph, plan and execute.
    ///
    /// Configuration and graph errors are returned directly; runner failures
    /// are collected in the outcome's report.
    pub async fn run(&self, request: &RunRequest) -> Result<RunOutcome> {
        let graph = self.graph(request).await?;
        let priorities = graph.priority_list();
        info!("execution order:\n{}", format_priorities(&priorities));

        if request.dry_run {
            return Ok(RunOutcome {
                priorities,
                report: None,
            });
        }

        let tags = TagSet::new(&self.config.execution.tags);
        let plan = ExecutionPlan::build(&graph, &priorities, &self.registry, &tags)?;
        let ctx = Arc::new(ExecutionContext {
            config: self.config.clone(),
            dispatcher: self.dispatcher.clone(),
            repo_root: self.config.root_dir.clone(),
        });

        let report = exec::execute(plan, ctx).await;
        Ok(RunOutcome {
            priorities,
            report: Some(report),
        })
    }

    /// Execute the single runner addressed by the config's `[dispatch]` slot.
    pub fn exec_dispatched(&self) -> Result<()> {
        super::dispatched::exec_dispatched_runner(&self.config, &self.registry, &self.discovery)
    }
}
