// src/toolchain/mod.rs

//! Toolchain detection and dispatch.
//!
//! A runner declares the toolchain it needs (`rust`, `go`, ...). When the
//! current shell does not provide it, the runner is re-executed by a
//! [`ToolchainDispatcher`], which enters the toolchain's environment and
//! calls `repodag exec-runner` with a config file carrying [`DispatchArgs`].

mod dispatcher;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub use dispatcher::{CommandDispatcher, ToolchainDispatcher};

/// Default environment variable listing the active toolchains.
pub const DEFAULT_TOOLCHAIN_ENV_VAR: &str = "REPODAG_TOOLCHAINS";

/// Toolchain that every environment provides.
pub const NO_TOOLCHAIN: &str = "none";

/// Address of one runner instance, written into the reserved `[dispatch]`
/// slot of the handed-off config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchArgs {
    /// Absolute root of the component that owns the target.
    pub component_dir: PathBuf,
    #[serde(rename = "targetID")]
    pub target_id: String,
    pub step_index: usize,
    pub runner_index: usize,
    #[serde(rename = "runnerID", default, skip_serializing_if = "Option::is_none")]
    pub runner_id: Option<String>,
    pub toolchain: String,
}

/// Whether `toolchain` is available in the current environment.
///
/// `env_var` holds a list separated by commas, colons or whitespace.
pub fn is_active(toolchain: &str, env_var: &str) -> bool {
    let value = std::env::var(env_var).unwrap_or_default();
    is_listed(toolchain, &value)
}

fn is_listed(toolchain: &str, list: &str) -> bool {
    toolchain == NO_TOOLCHAIN
        || list
            .split(|c: char| c == ',' || c == ':' || c.is_whitespace())
            .any(|entry| entry == toolchain)
}
