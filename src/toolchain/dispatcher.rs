// src/toolchain/dispatcher.rs

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, info};

use crate::config::{save_to_path, Config, ToolchainSection};
use crate::errors::{RepodagError, Result};

use super::DispatchArgs;

/// Re-enters the program inside a toolchain environment.
///
/// Production code uses [`CommandDispatcher`]; tests provide recording
/// implementations.
pub trait ToolchainDispatcher: Send + Sync {
    fn run(&self, repo_root: &Path, args: &DispatchArgs, config: &Config) -> Result<()>;
}

/// Dispatcher that runs `<prefix...> <exe> exec-runner --skip-toolchain-dispatch
/// --config <handoff.toml>`.
///
/// `{toolchain}` and `{root}` in the prefix are substituted.
#[derive(Debug, Clone)]
pub struct CommandDispatcher {
    prefix: Vec<String>,
    executable: PathBuf,
}

impl CommandDispatcher {
    pub fn new(prefix: Vec<String>, executable: PathBuf) -> Self {
        Self { prefix, executable }
    }

    /// `None` when no `dispatch_command` is configured.
    pub fn from_config(section: &ToolchainSection) -> Result<Option<Self>> {
        if section.dispatch_command.is_empty() {
            return Ok(None);
        }
        let executable = match &section.executable {
            Some(exe) => exe.clone(),
            None => std::env::current_exe()?,
        };
        Ok(Some(Self::new(section.dispatch_command.clone(), executable)))
    }

    /// Full argv of the re-entry command.
    pub fn build_command(&self, repo_root: &Path, toolchain: &str, config_path: &Path) -> Vec<String> {
        let root = repo_root.display().to_string();
        let mut argv: Vec<String> = self
            .prefix
            .iter()
            .map(|part| part.replace("{toolchain}", toolchain).replace("{root}", &root))
            .collect();
        argv.push(self.executable.display().to_string());
        argv.extend([
            "exec-runner".to_string(),
            "--skip-toolchain-dispatch".to_string(),
            "--config".to_string(),
            config_path.display().to_string(),
        ]);
        argv
    }
}

impl ToolchainDispatcher for CommandDispatcher {
    fn run(&self, repo_root: &Path, args: &DispatchArgs, config: &Config) -> Result<()> {
        let mut handoff = config.clone();
        handoff.dispatch = Some(args.clone());

        let file = tempfile::Builder::new()
            .prefix("repodag-dispatch-")
            .suffix(".toml")
            .tempfile()?;
        save_to_path(&handoff, file.path())?;
        debug!(path = %file.path().display(), "wrote dispatch config");

        let argv = self.build_command(repo_root, &args.toolchain, file.path());
        info!(
            target = %args.target_id,
            step = args.step_index,
            runner = args.runner_index,
            toolchain = %args.toolchain,
            command = %argv.join(" "),
            "dispatching runner into toolchain"
        );

        let (program, rest) = argv
            .split_first()
            .ok_or_else(|| RepodagError::DispatchError("empty dispatch command".to_string()))?;
        let status = Command::new(program)
            .args(rest)
            .current_dir(repo_root)
            .status()
            .map_err(|e| RepodagError::DispatchError(format!("spawning '{program}': {e}")))?;

        if !status.success() {
            return Err(RepodagError::DispatchError(format!(
                "'{}' in toolchain '{}' exited with {}",
                args.target_id, args.toolchain, status
            )));
        }
        Ok(())
    }
}
