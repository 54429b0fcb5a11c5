use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::bail;
use serde::Deserialize;

use repodag::config::Config;
use repodag::errors::Result;
use repodag::model::StageTable;
use repodag::runner::{Runner, RunnerContext, RunnerData, RunnerKey, RunnerRegistry};
use repodag::toolchain::{DispatchArgs, ToolchainDispatcher};

/// ID of the probe runner.
pub const PROBE_RUNNER_ID: &str = "test::probe";
/// Short name the probe is bound to in every stage.
pub const PROBE_RUNNER_NAME: &str = "probe";

/// Shared, ordered record of what ran.
#[derive(Debug, Clone, Default)]
pub struct Journal {
    entries: Arc<Mutex<Vec<String>>>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: String) {
        self.entries.lock().unwrap().push(entry);
    }

    /// `<target>/<step>/<runner>` entries in start order.
    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().unwrap().clone()
    }

    /// Target IDs in start order, one per runner invocation.
    pub fn targets(&self) -> Vec<String> {
        self.entries()
            .into_iter()
            .map(|e| e.split('/').next().unwrap_or_default().to_string())
            .collect()
    }

    pub fn position(&self, target: &str) -> Option<usize> {
        self.targets().iter().position(|t| t == target)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }
}

/// Step config of the probe runner.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProbeConfig {
    #[serde(default)]
    pub fail: bool,
    #[serde(default)]
    pub panic: bool,
    #[serde(default)]
    pub sleep_ms: u64,
}

/// Runner that journals its invocation and then succeeds, fails or panics
/// as configured.
pub struct ProbeRunner {
    config: Arc<ProbeConfig>,
    journal: Journal,
}

impl Runner for ProbeRunner {
    fn run(&self, ctx: &RunnerContext<'_>) -> anyhow::Result<()> {
        self.journal
            .push(format!("{}/{}/{}", ctx.target, ctx.step_index, ctx.runner_index));
        if self.config.sleep_ms > 0 {
            std::thread::sleep(Duration::from_millis(self.config.sleep_ms));
        }
        if self.config.panic {
            panic!("probe panicked in {}", ctx.target);
        }
        if self.config.fail {
            bail!("probe failed in {}", ctx.target);
        }
        Ok(())
    }
}

/// Register the probe as `test::probe` with default toolchain `toolchain`
/// and bind it to `(stage, "probe")` for every default stage.
pub fn register_probe(registry: &mut RunnerRegistry, journal: &Journal, toolchain: Option<&str>) -> Result<()> {
    let journal = journal.clone();
    registry.register(
        PROBE_RUNNER_ID,
        vec![RunnerData::typed::<ProbeConfig, _, _>(toolchain, move |config| {
            Ok(ProbeRunner {
                config,
                journal: journal.clone(),
            })
        })],
    )?;
    for stage in StageTable::default().iter() {
        registry.register_to_key(RunnerKey::new(&stage.name, PROBE_RUNNER_NAME), PROBE_RUNNER_ID)?;
    }
    Ok(())
}

/// Registry holding only the probe (default toolchain `none`).
pub fn probe_registry(journal: &Journal) -> RunnerRegistry {
    let mut registry = RunnerRegistry::new();
    register_probe(&mut registry, journal, Some("none")).expect("probe registers");
    registry
}

/// Dispatcher that records its calls instead of spawning anything.
#[derive(Debug, Clone, Default)]
pub struct RecordingDispatcher {
    calls: Arc<Mutex<Vec<DispatchArgs>>>,
    fail: bool,
}

impl RecordingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<DispatchArgs> {
        self.calls.lock().unwrap().clone()
    }
}

impl ToolchainDispatcher for RecordingDispatcher {
    fn run(&self, _repo_root: &Path, args: &DispatchArgs, _config: &Config) -> Result<()> {
        self.calls.lock().unwrap().push(args.clone());
        if self.fail {
            return Err(repodag::errors::RepodagError::DispatchError(format!(
                "toolchain '{}' unavailable",
                args.toolchain
            )));
        }
        Ok(())
    }
}
