// src/config/model.rs

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::toolchain::DispatchArgs;
use crate::types::ExecutionMode;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// root_dir = "."
///
/// [discovery]
/// descriptor = ".component.yaml"
/// ignore_dirs = [".git", ".direnv"]
///
/// [execution]
/// mode = "concurrent"
/// max_parallel = 4
/// tags = ["ci"]
///
/// [toolchain]
/// dispatch_command = ["nix", "develop", "{root}/tools/nix#{toolchain}", "--command"]
///
/// [[stages]]
/// name = "build"
/// priority = 1
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawConfig {
    /// Repository root; relative paths are resolved against the directory
    /// containing the config file.
    #[serde(default = "default_root_dir")]
    pub root_dir: PathBuf,

    #[serde(default)]
    pub discovery: DiscoverySection,

    #[serde(default)]
    pub execution: ExecutionSection,

    #[serde(default)]
    pub toolchain: ToolchainSection,

    /// Global stage table. Lower priority runs earlier.
    #[serde(default = "default_stages")]
    pub stages: Vec<StageConfig>,

    /// Reserved slot written by the toolchain dispatcher before re-entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dispatch: Option<DispatchArgs>,
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            root_dir: default_root_dir(),
            discovery: DiscoverySection::default(),
            execution: ExecutionSection::default(),
            toolchain: ToolchainSection::default(),
            stages: default_stages(),
            dispatch: None,
        }
    }
}

/// Validated configuration.
///
/// Only obtainable through `Config::try_from(RawConfig)` (or `default()`), so
/// holders can rely on the invariants checked in `config::validate`.
/// Serializes to the same shape as [`RawConfig`], which is what the toolchain
/// dispatcher relies on for the config handoff.
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    pub root_dir: PathBuf,
    pub discovery: DiscoverySection,
    pub execution: ExecutionSection,
    pub toolchain: ToolchainSection,
    pub stages: Vec<StageConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dispatch: Option<DispatchArgs>,
}

impl Config {
    pub(crate) fn new_unchecked(raw: RawConfig) -> Self {
        Self {
            root_dir: raw.root_dir,
            discovery: raw.discovery,
            execution: raw.execution,
            toolchain: raw.toolchain,
            stages: raw.stages,
            dispatch: raw.dispatch,
        }
    }

    /// Back to the raw, deserializable form (used by test builders).
    pub fn into_raw(self) -> RawConfig {
        RawConfig {
            root_dir: self.root_dir,
            discovery: self.discovery,
            execution: self.execution,
            toolchain: self.toolchain,
            stages: self.stages,
            dispatch: self.dispatch,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::new_unchecked(RawConfig::default())
    }
}

/// `[discovery]` section.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DiscoverySection {
    /// File name that marks a component directory.
    #[serde(default = "default_descriptor")]
    pub descriptor: String,

    /// Directory names never descended into.
    #[serde(default = "default_ignore_dirs")]
    pub ignore_dirs: Vec<String>,

    /// Skip descriptors that Git reports as ignored.
    #[serde(default = "default_true")]
    pub respect_git_ignore: bool,

    /// If set, outputs go to `<output_base>/.output/<component>` instead of
    /// `<component-root>/.output`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_base: Option<PathBuf>,
}

impl Default for DiscoverySection {
    fn default() -> Self {
        Self {
            descriptor: default_descriptor(),
            ignore_dirs: default_ignore_dirs(),
            respect_git_ignore: true,
            output_base: None,
        }
    }
}

/// `[execution]` section.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExecutionSection {
    #[serde(default)]
    pub mode: ExecutionMode,

    /// Size of the worker pool in concurrent mode.
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,

    /// Tags of this invocation, matched against step tag expressions.
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Default for ExecutionSection {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::default(),
            max_parallel: default_max_parallel(),
            tags: Vec::new(),
        }
    }
}

/// `[toolchain]` section.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ToolchainSection {
    /// Environment variable listing the toolchains active in this shell.
    #[serde(default = "default_toolchain_env_var")]
    pub env_var: String,

    /// Command prefix that enters a toolchain environment. `{toolchain}` and
    /// `{root}` are substituted. Empty means no dispatcher is configured.
    #[serde(default)]
    pub dispatch_command: Vec<String>,

    /// Executable to re-enter; defaults to the current executable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executable: Option<PathBuf>,

    /// Run runners in the current shell even if their toolchain is missing.
    #[serde(default)]
    pub skip_dispatch: bool,
}

impl Default for ToolchainSection {
    fn default() -> Self {
        Self {
            env_var: default_toolchain_env_var(),
            dispatch_command: Vec::new(),
            executable: None,
            skip_dispatch: false,
        }
    }
}

/// One `[[stages]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct StageConfig {
    pub name: String,
    pub priority: i32,
}

impl StageConfig {
    pub fn new(name: impl Into<String>, priority: i32) -> Self {
        Self {
            name: name.into(),
            priority,
        }
    }
}

fn default_root_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_descriptor() -> String {
    ".component.yaml".to_string()
}

fn default_ignore_dirs() -> Vec<String> {
    vec![".git".to_string(), ".direnv".to_string()]
}

fn default_true() -> bool {
    true
}

fn default_max_parallel() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

fn default_toolchain_env_var() -> String {
    crate::toolchain::DEFAULT_TOOLCHAIN_ENV_VAR.to_string()
}

pub fn default_stages() -> Vec<StageConfig> {
    vec![
        StageConfig::new("lint", 0),
        StageConfig::new("build", 1),
        StageConfig::new("test", 2),
        StageConfig::new("deploy", 3),
    ]
}
