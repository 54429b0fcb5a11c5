// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{Config, RawConfig};
use crate::errors::Result;

/// Load a configuration file from a given path and return the raw `RawConfig`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfig> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawConfig = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a configuration file from path and validate it.
///
/// A relative `root_dir` is resolved against the directory holding the file,
/// so `repodag --config tools/repodag.toml` behaves the same from anywhere.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<Config> {
    let path = path.as_ref();
    let mut raw_config = load_from_path(path)?;

    if raw_config.root_dir.is_relative() {
        raw_config.root_dir = config_dir(path).join(&raw_config.root_dir);
    }

    let config = Config::try_from(raw_config)?;
    Ok(config)
}

/// Like [`load_and_validate`], but a missing file yields the default config
/// rooted at the current directory.
pub fn load_or_default(path: impl AsRef<Path>) -> Result<Config> {
    let path = path.as_ref();
    if path.exists() {
        return load_and_validate(path);
    }

    debug!(path = %path.display(), "no config file found; using defaults");
    let mut config = Config::default();
    config.root_dir = std::env::current_dir()?;
    Ok(config)
}

/// Serialize `config` as TOML to `path`.
pub fn save_to_path(config: &Config, path: impl AsRef<Path>) -> Result<()> {
    let contents = toml::to_string(config)?;
    fs::write(path.as_ref(), contents)?;
    Ok(())
}

/// Default config location: `repodag.toml` in the current working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("repodag.toml")
}

fn config_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}
