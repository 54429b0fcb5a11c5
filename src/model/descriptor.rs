// src/model/descriptor.rs

//! Serde shape of a component descriptor file.
//!
//! ```yaml
//! name: lib
//! version: 1.2.0
//! language: rust
//! inputs:
//!   src:
//!     patterns: ["^src/.*\\.rs$", "!^src/generated/.*"]
//! targets:
//!   build:
//!     stage: build
//!     inputs: [self::src]
//!     depends: [core::build]
//!     steps:
//!       - runner: shell
//!         config:
//!           cmd: cargo build
//!         include:
//!           tagExpr: "ci && !skip-build"
//! ```
//!
//! Required fields are checked by [`Component::init`](super::Component::init),
//! not by serde, so a missing `name` produces a descriptive error.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ComponentDescriptor {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub version: String,

    #[serde(default)]
    pub language: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub inputs: BTreeMap<String, InputDescriptor>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub targets: BTreeMap<String, TargetDescriptor>,
}

impl ComponentDescriptor {
    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }

    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct InputDescriptor {
    #[serde(default)]
    pub patterns: Vec<String>,

    /// Match patterns against repository-root-relative paths.
    #[serde(default, rename = "relToRoot", skip_serializing_if = "is_false")]
    pub rel_to_root: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct TargetDescriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<StepDescriptor>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct StepDescriptor {
    /// Short runner name, resolved against the target's stage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runner: Option<String>,

    /// Globally unique runner ID.
    #[serde(default, rename = "runnerID", skip_serializing_if = "Option::is_none")]
    pub runner_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub toolchain: Option<String>,

    /// Opaque block handed to the runner's config unmarshaller.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<serde_yaml::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include: Option<IncludeDescriptor>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct IncludeDescriptor {
    #[serde(default, rename = "tagExpr", skip_serializing_if = "Option::is_none")]
    pub tag_expr: Option<String>,
}

fn is_false(b: &bool) -> bool {
    !*b
}
