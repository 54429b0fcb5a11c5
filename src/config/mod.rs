// src/config/mod.rs

//! Configuration loading and validation for repodag.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk and write it back for the toolchain
//!   dispatch handoff (`loader.rs`).
//! - Validate basic invariants like the stage table (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path, load_or_default, save_to_path};
pub use model::{
    Config, DiscoverySection, ExecutionSection, RawConfig, StageConfig, ToolchainSection,
};
