#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use repodag::config::{Config, RawConfig};
use repodag::model::{
    default_stage_mapper, Component, ComponentDescriptor, IncludeDescriptor, InitOptions,
    InputDescriptor, StageTable, StepDescriptor, TargetDescriptor,
};
use repodag::types::ExecutionMode;

/// Repository root used by in-memory fixtures.
pub const REPO_ROOT: &str = "/repo";

/// Builder for an initialised [`Component`] rooted at
/// `/repo/components/<name>` unless told otherwise.
pub struct ComponentBuilder {
    desc: ComponentDescriptor,
    root: PathBuf,
}

impl ComponentBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            desc: ComponentDescriptor {
                name: name.to_string(),
                version: "1.0.0".to_string(),
                language: "rust".to_string(),
                ..Default::default()
            },
            root: Path::new(REPO_ROOT).join("components").join(name),
        }
    }

    pub fn root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    /// Input matched against component-relative paths.
    pub fn input(mut self, name: &str, patterns: &[&str]) -> Self {
        self.desc.inputs.insert(
            name.to_string(),
            InputDescriptor {
                patterns: patterns.iter().map(|p| p.to_string()).collect(),
                rel_to_root: false,
            },
        );
        self
    }

    /// Input matched against repository-relative paths.
    pub fn root_input(mut self, name: &str, patterns: &[&str]) -> Self {
        self.desc.inputs.insert(
            name.to_string(),
            InputDescriptor {
                patterns: patterns.iter().map(|p| p.to_string()).collect(),
                rel_to_root: true,
            },
        );
        self
    }

    pub fn target(mut self, target: TargetBuilder) -> Self {
        self.desc.targets.insert(target.name, target.desc);
        self
    }

    pub fn descriptor(&self) -> &ComponentDescriptor {
        &self.desc
    }

    pub fn yaml(&self) -> String {
        self.desc.to_yaml().expect("descriptor serialises")
    }

    pub fn build(self) -> Arc<Component> {
        let stages = StageTable::default();
        let mapper = default_stage_mapper(&stages);
        let opts = InitOptions {
            stages: &stages,
            stage_mapper: Some(&mapper),
            output_base: None,
        };
        Arc::new(Component::init(self.desc, self.root, &opts).expect("valid component"))
    }
}

/// Builder for one target descriptor. Stage defaults to `build`.
pub struct TargetBuilder {
    name: String,
    desc: TargetDescriptor,
}

impl TargetBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            desc: TargetDescriptor {
                stage: Some("build".to_string()),
                ..Default::default()
            },
        }
    }

    pub fn stage(mut self, stage: &str) -> Self {
        self.desc.stage = Some(stage.to_string());
        self
    }

    pub fn depends(mut self, dep: &str) -> Self {
        self.desc.depends.push(dep.to_string());
        self
    }

    pub fn input(mut self, id: &str) -> Self {
        self.desc.inputs.push(id.to_string());
        self
    }

    pub fn step(mut self, step: StepDescriptor) -> Self {
        self.desc.steps.push(step);
        self
    }

    /// Step addressed by runner ID with a YAML config block.
    pub fn runner(self, runner_id: &str, config_yaml: &str) -> Self {
        self.step(step(runner_id, config_yaml))
    }

    /// Like [`runner`](Self::runner), guarded by a tag expression.
    pub fn tagged_runner(self, runner_id: &str, config_yaml: &str, tag_expr: &str) -> Self {
        let mut s = step(runner_id, config_yaml);
        s.include = Some(IncludeDescriptor {
            tag_expr: Some(tag_expr.to_string()),
        });
        self.step(s)
    }
}

/// Step descriptor for `runner_id`; an empty `config_yaml` means no block.
pub fn step(runner_id: &str, config_yaml: &str) -> StepDescriptor {
    let config = if config_yaml.trim().is_empty() {
        None
    } else {
        Some(serde_yaml::from_str(config_yaml).expect("valid step config"))
    };
    StepDescriptor {
        runner_id: Some(runner_id.to_string()),
        config,
        ..Default::default()
    }
}

/// Builder for a validated [`Config`].
pub struct ConfigBuilder {
    raw: RawConfig,
}

impl ConfigBuilder {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let mut raw = RawConfig::default();
        raw.root_dir = root.into();
        raw.discovery.respect_git_ignore = false;
        Self { raw }
    }

    pub fn concurrent(mut self, max_parallel: usize) -> Self {
        self.raw.execution.mode = ExecutionMode::Concurrent;
        self.raw.execution.max_parallel = max_parallel;
        self
    }

    pub fn tag(mut self, tag: &str) -> Self {
        self.raw.execution.tags.push(tag.to_string());
        self
    }

    pub fn skip_dispatch(mut self) -> Self {
        self.raw.toolchain.skip_dispatch = true;
        self
    }

    pub fn toolchain_env_var(mut self, var: &str) -> Self {
        self.raw.toolchain.env_var = var.to_string();
        self
    }

    pub fn build(self) -> Config {
        Config::try_from(self.raw).expect("Failed to build valid config from builder")
    }
}
