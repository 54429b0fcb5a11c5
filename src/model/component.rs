// src/model/component.rs

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::errors::{combine, RepodagError, Result};
use crate::matcher::{cached_regex, split_patterns, CompiledList};
use crate::model::descriptor::{ComponentDescriptor, StepDescriptor, TargetDescriptor};
use crate::model::id::{InputId, TargetId, NAMESPACE_SEPARATOR, SELF_REF};
use crate::model::output::OutputLayout;
use crate::model::stage::{StageMapper, StageTable};
use crate::tags::{TagExpr, TagSet};

const SEMVER_PATTERN: &str = r"^(0|[1-9]\d*)\.(0|[1-9]\d*)\.(0|[1-9]\d*)(?:-((?:0|[1-9]\d*|\d*[a-zA-Z-][0-9a-zA-Z-]*)(?:\.(?:0|[1-9]\d*|\d*[a-zA-Z-][0-9a-zA-Z-]*))*))?(?:\+([0-9a-zA-Z-]+(?:\.[0-9a-zA-Z-]+)*))?$";

/// Settings the `Init` hook needs from the global configuration.
#[derive(Debug, Clone, Copy)]
pub struct InitOptions<'a> {
    pub stages: &'a StageTable,
    /// Consulted for targets that omit `stage`.
    pub stage_mapper: Option<&'a StageMapper>,
    pub output_base: Option<&'a Path>,
}

/// A validated, immutable component.
#[derive(Debug, Clone)]
pub struct Component {
    pub name: String,
    pub version: String,
    pub language: String,
    /// Absolute component root.
    pub root: PathBuf,
    pub output: OutputLayout,
    pub inputs: BTreeMap<String, Input>,
    pub targets: BTreeMap<String, Target>,
}

/// A named change-matching specification.
#[derive(Debug, Clone, PartialEq)]
pub struct Input {
    pub id: InputId,
    pub patterns: Vec<String>,
    pub rel_to_root: bool,
    includes: CompiledList,
    excludes: CompiledList,
}

impl Input {
    fn compile(id: InputId, patterns: Vec<String>, rel_to_root: bool) -> anyhow::Result<Self> {
        let (inc, exc) = split_patterns(&patterns);
        Ok(Self {
            includes: CompiledList::compile(&inc, false)?,
            excludes: CompiledList::compile(&exc, false)?,
            id,
            patterns,
            rel_to_root,
        })
    }

    /// Include-then-exclude match of a path relative to the input's base.
    ///
    /// An input without include patterns includes everything.
    pub fn matches(&self, rel_path: &str) -> bool {
        (self.includes.is_empty() || self.includes.matches_any(rel_path))
            && !self.excludes.matches_any(rel_path)
    }

    pub fn includes(&self) -> &CompiledList {
        &self.includes
    }

    pub fn excludes(&self) -> &CompiledList {
        &self.excludes
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    pub id: TargetId,
    pub stage: String,
    pub stage_priority: i32,
    /// Input references as written; `self` forms are rewritten by the graph.
    pub inputs: Vec<String>,
    /// Dependency references as written.
    pub depends: Vec<String>,
    pub steps: Vec<Step>,
}

impl Target {
    pub fn name(&self) -> &str {
        self.id.name()
    }
}

/// How a step names its runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunnerSelector {
    /// Short name, scoped by the target's stage.
    Key(String),
    /// Globally unique runner ID.
    Id(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub index: usize,
    pub selector: RunnerSelector,
    pub toolchain: Option<String>,
    pub config: Option<serde_yaml::Value>,
    pub include: Option<TagExpr>,
}

impl Step {
    /// A step without a tag expression is always included.
    pub fn is_included(&self, tags: &TagSet) -> bool {
        self.include.as_ref().is_none_or(|expr| expr.matches(tags))
    }
}

impl Component {
    /// Validate and normalise a parsed descriptor.
    ///
    /// All problems found are reported together.
    pub fn init(desc: ComponentDescriptor, root: PathBuf, opts: &InitOptions<'_>) -> Result<Self> {
        let mut errors: Option<RepodagError> = None;
        let mut fail = |message: String| {
            let err = RepodagError::DescriptorError {
                path: root.clone(),
                message,
            };
            errors = Some(combine(errors.take(), err));
        };

        if let Err(msg) = validate_name(&desc.name) {
            fail(msg);
        }
        if desc.version.is_empty() {
            fail("missing required field 'version'".to_string());
        } else if !is_semver(&desc.version) {
            fail(format!("version '{}' is not a semantic version", desc.version));
        }
        if desc.language.is_empty() {
            fail("missing required field 'language'".to_string());
        }

        let mut inputs = BTreeMap::new();
        for (key, input) in desc.inputs {
            let id = InputId::new(&desc.name, &key);
            let name = id.input().unwrap_or(key.as_str()).to_string();
            if inputs.contains_key(&name) {
                fail(format!("input '{key}' collides with another input named '{name}'"));
                continue;
            }
            match Input::compile(id, input.patterns, input.rel_to_root) {
                Ok(compiled) => {
                    inputs.insert(name, compiled);
                }
                Err(e) => fail(format!("input '{key}': {e:#}")),
            }
        }

        let mut targets = BTreeMap::new();
        for (key, target) in desc.targets {
            match init_target(&desc.name, &key, target, opts) {
                // Keyed by the ID's name so lookups by ID find the target.
                Ok(t) if targets.contains_key(t.id.name()) => fail(format!(
                    "target '{key}' collides with another target named '{}'",
                    t.id.name()
                )),
                Ok(t) => {
                    targets.insert(t.id.name().to_string(), t);
                }
                Err(msgs) => msgs.into_iter().for_each(&mut fail),
            }
        }

        if let Some(err) = errors {
            return Err(err);
        }

        debug!(
            component = %desc.name,
            targets = targets.len(),
            inputs = inputs.len(),
            "component initialised"
        );

        Ok(Self {
            output: OutputLayout::new(&root, &desc.name, opts.output_base),
            name: desc.name,
            version: desc.version,
            language: desc.language,
            root,
            inputs,
            targets,
        })
    }

    pub fn target(&self, name: &str) -> Option<&Target> {
        self.targets.get(name)
    }

    pub fn input(&self, name: &str) -> Option<&Input> {
        self.inputs.get(name)
    }
}

fn validate_name(name: &str) -> std::result::Result<(), String> {
    if name.is_empty() {
        return Err("missing required field 'name'".to_string());
    }
    if name == SELF_REF {
        return Err(format!("component name must not be '{SELF_REF}'"));
    }
    if name.contains(NAMESPACE_SEPARATOR) {
        return Err(format!(
            "component name '{name}' must not contain '{NAMESPACE_SEPARATOR}'"
        ));
    }
    Ok(())
}

fn is_semver(version: &str) -> bool {
    cached_regex(SEMVER_PATTERN)
        .map(|re| re.is_match(version))
        .unwrap_or(false)
}

fn init_target(
    component: &str,
    key: &str,
    desc: TargetDescriptor,
    opts: &InitOptions<'_>,
) -> std::result::Result<Target, Vec<String>> {
    let mut msgs = Vec::new();
    let id = TargetId::new(component, key);

    let stage = desc
        .stage
        .clone()
        .or_else(|| opts.stage_mapper.and_then(|m| m.map(key)));
    let stage_priority = match &stage {
        None => {
            msgs.push(format!("target '{id}' has no stage"));
            None
        }
        Some(s) => match opts.stages.priority_of(s) {
            Some(p) => Some(p),
            None => {
                msgs.push(format!(
                    "target '{id}' uses unknown stage '{s}' (known: {})",
                    opts.stages.names().join(", ")
                ));
                None
            }
        },
    };

    let mut steps = Vec::with_capacity(desc.steps.len());
    for (index, step) in desc.steps.into_iter().enumerate() {
        match init_step(index, step) {
            Ok(s) => steps.push(s),
            Err(msg) => msgs.push(format!("target '{id}' step {index}: {msg}")),
        }
    }

    match (stage, stage_priority) {
        (Some(stage), Some(stage_priority)) if msgs.is_empty() => Ok(Target {
            id,
            stage,
            stage_priority,
            inputs: desc.inputs,
            depends: desc.depends,
            steps,
        }),
        _ => Err(msgs),
    }
}

fn init_step(index: usize, desc: StepDescriptor) -> std::result::Result<Step, String> {
    let selector = match (desc.runner, desc.runner_id) {
        (Some(key), None) => RunnerSelector::Key(key),
        (None, Some(id)) => RunnerSelector::Id(id),
        (Some(_), Some(_)) => {
            return Err("'runner' and 'runnerID' are mutually exclusive".to_string());
        }
        (None, None) => return Err("one of 'runner' or 'runnerID' is required".to_string()),
    };

    let include = match desc.include.and_then(|i| i.tag_expr) {
        Some(expr) => Some(
            TagExpr::parse(&expr).map_err(|e| format!("invalid tag expression '{expr}': {e}"))?,
        ),
        None => None,
    };

    Ok(Step {
        index,
        selector,
        toolchain: desc.toolchain,
        config: desc.config,
        include,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init(yaml: &str) -> Result<Component> {
        let desc = ComponentDescriptor::from_yaml(yaml).unwrap();
        let stages = StageTable::default();
        let opts = InitOptions {
            stages: &stages,
            stage_mapper: None,
            output_base: None,
        };
        Component::init(desc, PathBuf::from("/repo/lib"), &opts)
    }

    #[test]
    fn initialises_ids_and_steps() {
        let comp = init(
            r#"
name: lib
version: 0.1.0
language: rust
inputs:
  src: { patterns: ["^src/.*$", "!^src/gen/.*$"] }
targets:
  build:
    stage: build
    steps:
      - runner: shell
      - runnerID: acme::pack
"#,
        )
        .unwrap();

        let build = comp.target("build").unwrap();
        assert_eq!(build.id.as_str(), "lib::build");
        assert_eq!(build.stage_priority, 1);
        assert_eq!(build.steps[1].index, 1);
        assert_eq!(build.steps[1].selector, RunnerSelector::Id("acme::pack".into()));

        let src = comp.input("src").unwrap();
        assert_eq!(src.id.to_string(), "lib::src");
        assert!(src.matches("src/main.rs"));
        assert!(!src.matches("src/gen/x.rs"));
        assert!(!src.matches("docs/readme"));
        assert_eq!(comp.output.root(), Path::new("/repo/lib/.output"));
    }

    #[test]
    fn reports_all_problems_at_once() {
        let err = init(
            r#"
version: one
language: rust
targets:
  build:
    stage: nope
    steps:
      - runner: shell
        runnerID: x::y
      - {}
"#,
        )
        .unwrap_err();

        let text = err.to_string();
        assert!(text.contains("missing required field 'name'"), "{text}");
        assert!(text.contains("not a semantic version"), "{text}");
        assert!(text.contains("unknown stage 'nope'"), "{text}");
        assert!(text.contains("mutually exclusive"), "{text}");
        assert!(text.contains("is required"), "{text}");
        assert_eq!(err.errors().len(), 5);
    }

    #[test]
    fn stage_mapper_fills_missing_stage() {
        let desc = ComponentDescriptor::from_yaml(
            "name: lib\nversion: 1.0.0\nlanguage: go\ntargets:\n  unit-test:\n    steps: [{runner: shell}]\n",
        )
        .unwrap();
        let stages = StageTable::default();
        let mapper = crate::model::default_stage_mapper(&stages);
        let opts = InitOptions {
            stages: &stages,
            stage_mapper: Some(&mapper),
            output_base: None,
        };
        let comp = Component::init(desc, PathBuf::from("/r"), &opts).unwrap();
        assert_eq!(comp.target("unit-test").unwrap().stage, "test");
    }

    #[test]
    fn qualified_keys_are_found_by_their_id_name() {
        let comp = init(
            r#"
name: web
version: 1.0.0
language: go
inputs:
  "a::b": { patterns: ["^src/.*$"] }
targets:
  "pkg::build":
    stage: build
    steps:
      - runner: shell
"#,
        )
        .unwrap();

        let target = comp.target("pkg-build").unwrap();
        assert_eq!(target.id.as_str(), "web::pkg-build");
        assert!(comp.target("pkg::build").is_none());
        assert_eq!(comp.input("a-b").unwrap().id.to_string(), "web::a-b");
    }

    #[test]
    fn sanitised_name_collisions_are_rejected() {
        let err = init(
            "name: web\nversion: 1.0.0\nlanguage: go\ntargets:\n  pkg-build:\n    stage: build\n  \"pkg::build\":\n    stage: build\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("collides"));
    }

    #[test]
    fn rejects_reserved_names() {
        assert!(validate_name("self").is_err());
        assert!(validate_name("a::b").is_err());
        assert!(validate_name("lib").is_ok());
    }

    #[test]
    fn invalid_tag_expression_is_a_descriptor_error() {
        let err = init(
            "name: lib\nversion: 1.0.0\nlanguage: go\ntargets:\n  build:\n    stage: build\n    steps:\n      - runner: shell\n        include: { tagExpr: 'a &&' }\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("invalid tag expression"));
    }

    #[test]
    fn semver_check() {
        assert!(is_semver("1.2.3"));
        assert!(is_semver("1.2.3-rc.1+build.5"));
        assert!(!is_semver("1.2"));
        assert!(!is_semver("01.2.3"));
    }
}
