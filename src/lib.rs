// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod discovery;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod git;
pub mod logging;
pub mod matcher;
pub mod model;
pub mod runner;
pub mod tags;
pub mod toolchain;
pub mod types;

use std::path::PathBuf;

use anyhow::Result;
use tracing::{debug, warn};

use crate::cli::{CliArgs, Command, ListArgs, RunArgs};
use crate::config::{default_config_path, load_and_validate, load_or_default, Config};
use crate::dag::format_priorities;
use crate::engine::{ChangeSource, Orchestrator, RunRequest, TargetSelector};
use crate::types::ExecutionMode;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and CLI overrides
/// - discovery, graph and change propagation
/// - execution, or the single dispatched runner for `exec-runner`
pub async fn run(args: CliArgs) -> Result<()> {
    match args.command {
        Command::List(list) => {
            let cfg = load_config(args.config, true)?;
            print_components(Orchestrator::new(cfg)?, &list).await
        }
        Command::Run(run_args) => {
            let mut cfg = load_config(args.config, true)?;
            apply_run_overrides(&mut cfg, &run_args)?;
            run_targets(Orchestrator::new(cfg)?, run_args).await
        }
        Command::ExecRunner(exec) => {
            let mut cfg = load_config(args.config, false)?;
            if exec.skip_toolchain_dispatch {
                cfg.toolchain.skip_dispatch = true;
            } else {
                warn!("exec-runner invoked without --skip-toolchain-dispatch");
            }
            let orchestrator = Orchestrator::new(cfg)?;
            // Runs the runner on this worker thread.
            tokio::task::block_in_place(|| orchestrator.exec_dispatched())?;
            Ok(())
        }
    }
}

/// Load the config and make its root absolute.
///
/// `allow_default` permits a missing default `repodag.toml`.
fn load_config(path: Option<PathBuf>, allow_default: bool) -> Result<Config> {
    let mut cfg = match (path, allow_default) {
        (Some(path), _) => load_and_validate(&path)?,
        (None, true) => load_or_default(default_config_path())?,
        (None, false) => anyhow::bail!("--config is required"),
    };
    cfg.root_dir = std::path::absolute(&cfg.root_dir)?;
    debug!(root = %cfg.root_dir.display(), "configuration loaded");
    Ok(cfg)
}

fn apply_run_overrides(cfg: &mut Config, args: &RunArgs) -> Result<()> {
    if args.concurrent {
        cfg.execution.mode = ExecutionMode::Concurrent;
    }
    if let Some(n) = args.max_parallel {
        cfg.execution.max_parallel = n;
    }
    cfg.execution.tags.extend(args.tags.iter().cloned());
    if args.skip_toolchain_dispatch {
        cfg.toolchain.skip_dispatch = true;
    }

    // Flags go through the same checks as the file.
    *cfg = Config::try_from(cfg.clone().into_raw())?;
    Ok(())
}

async fn run_targets(orchestrator: Orchestrator, args: RunArgs) -> Result<()> {
    let changes = match (args.changed_since, args.changed.is_empty()) {
        (Some(since), _) => ChangeSource::GitSince(since),
        (None, false) => ChangeSource::Paths(args.changed),
        (None, true) => ChangeSource::Everything,
    };
    let request = RunRequest {
        components: args.components,
        selector: TargetSelector {
            targets: args.targets,
            stage: args.stage,
        },
        changes,
        dry_run: args.dry_run,
    };

    let outcome = orchestrator.run(&request).await?;
    if request.dry_run {
        print!("{}", format_priorities(&outcome.priorities));
        return Ok(());
    }
    outcome.into_result()?;
    Ok(())
}

async fn print_components(orchestrator: Orchestrator, args: &ListArgs) -> Result<()> {
    let found = orchestrator.discover(&args.components).await?;
    let root = &orchestrator.config().root_dir;

    for component in &found.selected {
        let rel = component.root.strip_prefix(root).unwrap_or(&component.root);
        println!(
            "{} {} ({}) {}",
            component.name,
            component.version,
            component.language,
            rel.display()
        );
        for target in component.targets.values() {
            println!("  {:<24} stage={} steps={}", target.id, target.stage, target.steps.len());
        }
    }
    Ok(())
}
