// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Command-line arguments for `repodag`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "repodag",
    version,
    about = "Discover monorepo components and run their targets in dependency order.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `repodag.toml` in the current working directory; built-in
    /// defaults are used if it does not exist.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `REPODAG_LOG` or a default level will be used.
    #[arg(long, global = true, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Print discovered components and their targets.
    List(ListArgs),
    /// Build the target graph and execute the changed targets.
    Run(RunArgs),
    /// Execute one dispatched runner (used by the toolchain dispatcher).
    ExecRunner(ExecRunnerArgs),
}

#[derive(Debug, Clone, Default, Args)]
pub struct ListArgs {
    /// Component name glob; prefix with `!` to exclude. Repeatable.
    #[arg(long = "component", value_name = "GLOB")]
    pub components: Vec<String>,
}

#[derive(Debug, Clone, Default, Args)]
pub struct RunArgs {
    /// Component name glob; prefix with `!` to exclude. Repeatable.
    #[arg(long = "component", value_name = "GLOB")]
    pub components: Vec<String>,

    /// Target name (in every selected component) or full `component::target` ID.
    #[arg(long = "target", value_name = "TARGET")]
    pub targets: Vec<String>,

    /// Only select targets of this stage.
    #[arg(long, value_name = "STAGE")]
    pub stage: Option<String>,

    /// Changed path. Repeatable; without any, everything counts as changed.
    #[arg(long = "changed", value_name = "PATH", conflicts_with = "changed_since")]
    pub changed: Vec<PathBuf>,

    /// Take the changed paths from `git diff` against this ref.
    #[arg(long, value_name = "REF")]
    pub changed_since: Option<String>,

    /// Run independent targets in parallel.
    #[arg(long)]
    pub concurrent: bool,

    /// Worker pool size in concurrent mode.
    #[arg(long, value_name = "N")]
    pub max_parallel: Option<usize>,

    /// Invocation tag matched against step tag expressions. Repeatable.
    #[arg(long = "tag", value_name = "TAG")]
    pub tags: Vec<String>,

    /// Print the priority listing, but don't execute anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Run runners in the current shell even if their toolchain is missing.
    #[arg(long)]
    pub skip_toolchain_dispatch: bool,
}

#[derive(Debug, Clone, Default, Args)]
pub struct ExecRunnerArgs {
    #[arg(long)]
    pub skip_toolchain_dispatch: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
