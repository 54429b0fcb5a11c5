// src/runner/shell.rs

//! Built-in `shell` runner.
//!
//! ```yaml
//! steps:
//!   - runner: shell
//!     config:
//!       cmd: make -j4
//!       cwd: src        # relative to the component root
//!       env:
//!         PROFILE: release
//! ```

use std::collections::BTreeMap;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::model::StageTable;
use crate::runner::{Runner, RunnerContext, RunnerData, RunnerKey, RunnerRegistry};
use crate::toolchain::NO_TOOLCHAIN;

pub const SHELL_RUNNER_ID: &str = "repodag::shell";
pub const SHELL_RUNNER_NAME: &str = "shell";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ShellConfig {
    pub cmd: String,
    #[serde(default)]
    pub cwd: Option<PathBuf>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct ShellRunner {
    config: Arc<ShellConfig>,
}

impl ShellRunner {
    pub fn new(config: Arc<ShellConfig>) -> Result<Self> {
        if config.cmd.trim().is_empty() {
            bail!("'cmd' must not be empty");
        }
        Ok(Self { config })
    }

    fn command(&self, ctx: &RunnerContext<'_>) -> Command {
        let mut cmd = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(&self.config.cmd);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c").arg(&self.config.cmd);
            c
        };

        let cwd = match &self.config.cwd {
            Some(dir) => ctx.component.root.join(dir),
            None => ctx.component.root.clone(),
        };
        cmd.current_dir(cwd)
            .env("REPODAG_REPO_ROOT", ctx.repo_root)
            .env("REPODAG_COMPONENT", &ctx.component.name)
            .env("REPODAG_COMPONENT_ROOT", &ctx.component.root)
            .env("REPODAG_COMPONENT_VERSION", &ctx.component.version)
            .env("REPODAG_TARGET", ctx.target.as_str())
            .env("REPODAG_TOOLCHAIN", ctx.toolchain);
        for (key, path) in ctx.component.output.env_vars() {
            cmd.env(key, path);
        }
        cmd.envs(&self.config.env);
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        cmd
    }
}

impl Runner for ShellRunner {
    fn run(&self, ctx: &RunnerContext<'_>) -> Result<()> {
        info!(
            target = %ctx.target,
            step = ctx.step_index,
            cmd = %self.config.cmd,
            "running shell step"
        );

        let mut child = self
            .command(ctx)
            .spawn()
            .with_context(|| format!("spawning '{}'", self.config.cmd))?;

        // Drain stderr on its own thread so neither pipe can fill up.
        let stderr_thread = child.stderr.take().map(|stderr| {
            let target = ctx.target.to_string();
            std::thread::spawn(move || {
                for line in BufReader::new(stderr).lines().map_while(Result::ok) {
                    debug!(target = %target, "stderr: {}", line);
                }
            })
        });

        if let Some(stdout) = child.stdout.take() {
            for line in BufReader::new(stdout).lines().map_while(Result::ok) {
                info!(target = %ctx.target, "{}", line);
            }
        }

        let status = child
            .wait()
            .with_context(|| format!("waiting for '{}'", self.config.cmd))?;
        if let Some(handle) = stderr_thread {
            let _ = handle.join();
        }

        let code = status.code().unwrap_or(-1);
        debug!(target = %ctx.target, exit_code = code, "shell step exited");
        if !status.success() {
            bail!("'{}' exited with code {code}", self.config.cmd);
        }
        Ok(())
    }
}

/// Register the shell runner and bind it to `(stage, "shell")` for every
/// stage in `stages`.
pub fn register(registry: &mut RunnerRegistry, stages: &StageTable) -> crate::errors::Result<()> {
    registry.register(
        SHELL_RUNNER_ID,
        vec![RunnerData::typed::<ShellConfig, _, _>(
            Some(NO_TOOLCHAIN),
            ShellRunner::new,
        )],
    )?;
    for stage in stages.iter() {
        registry.register_to_key(RunnerKey::new(&stage.name, SHELL_RUNNER_NAME), SHELL_RUNNER_ID)?;
    }
    Ok(())
}
