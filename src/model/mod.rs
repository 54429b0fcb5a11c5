// src/model/mod.rs

//! Components, inputs, targets, steps and stages.
//!
//! Components are parsed from [`descriptor`] files and turned into validated
//! runtime values by [`Component::init`]; after that they are never mutated.

pub mod component;
pub mod descriptor;
pub mod id;
pub mod output;
pub mod stage;

pub use component::{Component, InitOptions, Input, RunnerSelector, Step, Target};
pub use descriptor::{
    ComponentDescriptor, IncludeDescriptor, InputDescriptor, StepDescriptor, TargetDescriptor,
};
pub use id::{normalize_ref, InputId, TargetId, NAMESPACE_SEPARATOR, SELF_REF};
pub use output::OutputLayout;
pub use stage::{default_stage_mapper, Stage, StageMapper, StageTable};
