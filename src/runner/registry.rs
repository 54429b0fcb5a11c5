// src/runner/registry.rs

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_yaml::Value;
use tracing::debug;

use crate::errors::{RepodagError, Result};
use crate::model::{RunnerSelector, Step};
use crate::runner::{AnyConfig, Runner, RunnerInstance};

type Creator = dyn Fn(AnyConfig) -> anyhow::Result<Arc<dyn Runner>> + Send + Sync;
type Unmarshaller = dyn Fn(Option<&Value>) -> anyhow::Result<AnyConfig> + Send + Sync;

/// How to build one runner instance.
#[derive(Clone)]
pub struct RunnerData {
    pub creator: Arc<Creator>,
    pub config_unmarshaller: Arc<Unmarshaller>,
    pub default_toolchain: Option<String>,
}

impl RunnerData {
    /// Runner data for a config type `C` deserialised from the step's
    /// `config` block (an empty mapping when the block is absent).
    pub fn typed<C, R, F>(default_toolchain: Option<&str>, create: F) -> Self
    where
        C: DeserializeOwned + Send + Sync + 'static,
        R: Runner + 'static,
        F: Fn(Arc<C>) -> anyhow::Result<R> + Send + Sync + 'static,
    {
        let unmarshal = |raw: Option<&Value>| -> anyhow::Result<AnyConfig> {
            let value = raw
                .cloned()
                .unwrap_or_else(|| Value::Mapping(Default::default()));
            let config: C = serde_yaml::from_value(value)?;
            Ok(Arc::new(config))
        };
        let creator = move |config: AnyConfig| -> anyhow::Result<Arc<dyn Runner>> {
            let typed = config
                .downcast::<C>()
                .map_err(|_| anyhow::anyhow!("config has an unexpected type"))?;
            Ok(Arc::new(create(typed)?))
        };

        Self {
            creator: Arc::new(creator),
            config_unmarshaller: Arc::new(unmarshal),
            default_toolchain: default_toolchain.map(str::to_string),
        }
    }
}

impl fmt::Debug for RunnerData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunnerData")
            .field("default_toolchain", &self.default_toolchain)
            .finish_non_exhaustive()
    }
}

/// `(stage, short-name)` address of a runner.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RunnerKey {
    pub stage: String,
    pub name: String,
}

impl RunnerKey {
    pub fn new(stage: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for RunnerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.stage, self.name)
    }
}

/// Maps runner IDs and keys to runner data.
///
/// Filled once at startup and only read afterwards.
#[derive(Debug, Default)]
pub struct RunnerRegistry {
    runners: BTreeMap<String, Vec<RunnerData>>,
    keys: HashMap<RunnerKey, String>,
}

impl RunnerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a globally unique ID to one or more runner data entries; each
    /// entry yields one instance per step.
    pub fn register(&mut self, id: impl Into<String>, data: Vec<RunnerData>) -> Result<()> {
        let id = id.into();
        if data.is_empty() {
            return Err(RepodagError::ConfigError(format!(
                "runner '{id}' must be registered with at least one entry"
            )));
        }
        if self.runners.contains_key(&id) {
            return Err(RepodagError::ConfigError(format!(
                "runner '{id}' is already registered"
            )));
        }
        debug!(runner = %id, entries = data.len(), "registered runner");
        self.runners.insert(id, data);
        Ok(())
    }

    /// Bind a `(stage, name)` key to an already registered ID.
    pub fn register_to_key(&mut self, key: RunnerKey, id: impl Into<String>) -> Result<()> {
        let id = id.into();
        if !self.runners.contains_key(&id) {
            return Err(RepodagError::ConfigError(format!(
                "cannot bind key '{key}' to unknown runner '{id}'"
            )));
        }
        if let Some(existing) = self.keys.get(&key) {
            return Err(RepodagError::ConfigError(format!(
                "runner key '{key}' is already bound to '{existing}'"
            )));
        }
        self.keys.insert(key, id);
        Ok(())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.runners.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.runners.keys().map(String::as_str)
    }

    pub fn resolve_key(&self, key: &RunnerKey) -> Option<&str> {
        self.keys.get(key).map(String::as_str)
    }

    /// Build every instance registered under `id`.
    ///
    /// The toolchain is the step override if given, else the entry's
    /// default; without either the construction fails.
    pub fn create_by_id(
        &self,
        id: &str,
        toolchain: Option<&str>,
        raw_config: Option<&Value>,
    ) -> Result<Vec<RunnerInstance>> {
        let construction_error = |message: String| RepodagError::RunnerConstruction {
            runner: id.to_string(),
            message,
        };

        let entries = self
            .runners
            .get(id)
            .ok_or_else(|| construction_error("no runner registered under this ID".to_string()))?;

        let mut instances = Vec::with_capacity(entries.len());
        for (i, data) in entries.iter().enumerate() {
            let config = (data.config_unmarshaller)(raw_config)
                .map_err(|e| construction_error(format!("invalid config: {e:#}")))?;
            let runner = (data.creator)(Arc::clone(&config))
                .map_err(|e| construction_error(format!("creating instance {i}: {e:#}")))?;
            let toolchain = toolchain
                .map(str::to_string)
                .or_else(|| data.default_toolchain.clone())
                .ok_or_else(|| {
                    construction_error("no toolchain set on the step or the runner".to_string())
                })?;

            instances.push(RunnerInstance {
                runner_id: id.to_string(),
                runner,
                config,
                toolchain,
            });
        }
        Ok(instances)
    }

    pub fn create_by_key(
        &self,
        key: &RunnerKey,
        toolchain: Option<&str>,
        raw_config: Option<&Value>,
    ) -> Result<Vec<RunnerInstance>> {
        let id = self
            .resolve_key(key)
            .ok_or_else(|| RepodagError::RunnerConstruction {
                runner: key.to_string(),
                message: "no runner bound to this stage and name".to_string(),
            })?;
        self.create_by_id(id, toolchain, raw_config)
    }

    /// Instances for `step` of a target in `stage`.
    pub fn create_for_step(&self, stage: &str, step: &Step) -> Result<Vec<RunnerInstance>> {
        let toolchain = step.toolchain.as_deref();
        let raw = step.config.as_ref();
        match &step.selector {
            RunnerSelector::Id(id) => self.create_by_id(id, toolchain, raw),
            RunnerSelector::Key(name) => {
                self.create_by_key(&RunnerKey::new(stage, name.as_str()), toolchain, raw)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::RunnerContext;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct EchoConfig {
        #[serde(default)]
        text: String,
    }

    struct Echo;

    impl Runner for Echo {
        fn run(&self, _ctx: &RunnerContext<'_>) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn echo_data(toolchain: Option<&str>) -> RunnerData {
        RunnerData::typed::<EchoConfig, _, _>(toolchain, |_cfg| Ok(Echo))
    }

    #[test]
    fn duplicate_ids_and_keys_are_rejected() {
        let mut reg = RunnerRegistry::new();
        reg.register("t::echo", vec![echo_data(Some("none"))]).unwrap();
        assert!(reg.register("t::echo", vec![echo_data(None)]).is_err());

        reg.register_to_key(RunnerKey::new("build", "echo"), "t::echo").unwrap();
        assert!(reg.register_to_key(RunnerKey::new("build", "echo"), "t::echo").is_err());
        assert!(reg.register_to_key(RunnerKey::new("test", "echo"), "t::missing").is_err());
    }

    #[test]
    fn typed_config_is_unmarshalled() {
        let mut reg = RunnerRegistry::new();
        reg.register("t::echo", vec![echo_data(Some("none"))]).unwrap();

        let raw: Value = serde_yaml::from_str("text: hello").unwrap();
        let instances = reg.create_by_id("t::echo", None, Some(&raw)).unwrap();
        assert_eq!(instances.len(), 1);
        assert_eq!(
            instances[0].config_as::<EchoConfig>(),
            Some(&EchoConfig { text: "hello".into() })
        );
        assert_eq!(instances[0].toolchain, "none");

        let defaulted = reg.create_by_id("t::echo", None, None).unwrap();
        assert_eq!(defaulted[0].config_as::<EchoConfig>().map(|c| c.text.as_str()), Some(""));
    }

    #[test]
    fn toolchain_precedence() {
        let mut reg = RunnerRegistry::new();
        reg.register("t::echo", vec![echo_data(Some("rust"))]).unwrap();
        reg.register("t::bare", vec![echo_data(None)]).unwrap();

        let over = reg.create_by_id("t::echo", Some("go"), None).unwrap();
        assert_eq!(over[0].toolchain, "go");
        let default = reg.create_by_id("t::echo", None, None).unwrap();
        assert_eq!(default[0].toolchain, "rust");

        let err = reg.create_by_id("t::bare", None, None).unwrap_err();
        assert!(matches!(err, RepodagError::RunnerConstruction { .. }));
    }

    #[test]
    fn bad_config_is_a_construction_error() {
        let mut reg = RunnerRegistry::new();
        reg.register("t::echo", vec![echo_data(Some("none"))]).unwrap();
        let raw: Value = serde_yaml::from_str("text: [1, 2]").unwrap();
        let err = reg.create_by_id("t::echo", None, Some(&raw)).unwrap_err();
        assert!(err.to_string().contains("invalid config"));
    }

    #[test]
    fn key_lookup_is_scoped_by_stage() {
        let mut reg = RunnerRegistry::new();
        reg.register("t::echo", vec![echo_data(Some("none")), echo_data(Some("none"))])
            .unwrap();
        reg.register_to_key(RunnerKey::new("build", "echo"), "t::echo").unwrap();

        assert_eq!(
            reg.create_by_key(&RunnerKey::new("build", "echo"), None, None)
                .unwrap()
                .len(),
            2
        );
        assert!(reg.create_by_key(&RunnerKey::new("test", "echo"), None, None).is_err());
    }
}
