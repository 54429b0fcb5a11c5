// src/errors.rs

//! Crate-wide error type, aliases and the pairwise error combinator.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RepodagError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid component descriptor '{}': {message}", .path.display())]
    DescriptorError { path: PathBuf, message: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("TOML serialization error: {0}")]
    TomlWriteError(#[from] toml::ser::Error),

    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Target '{target}' depends on unknown target '{dependency}'")]
    UnknownTarget { target: String, dependency: String },

    #[error("Target '{target}' references unknown input '{input}'")]
    UnknownInput { target: String, input: String },

    #[error("Selected targets are not loaded: {}", .0.join(", "))]
    SelectionNotFound(Vec<String>),

    #[error("Target graph contains a cycle:\n{0}")]
    DagCycle(String),

    #[error("Cannot create runner '{runner}': {message}")]
    RunnerConstruction { runner: String, message: String },

    #[error("Runner {runner} of step {step} in target '{target}' failed: {source:#}")]
    RunnerFailed {
        target: String,
        step: usize,
        runner: usize,
        #[source]
        source: anyhow::Error,
    },

    #[error("Toolchain dispatch failed: {0}")]
    DispatchError(String),

    #[error("Assertion failed: {0}")]
    Assertion(String),

    #[error("{}", MultiDisplay(.0))]
    Multiple(Vec<RepodagError>),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, RepodagError>;

impl RepodagError {
    /// Flattened list of the individual errors behind this one.
    pub fn errors(&self) -> Vec<&RepodagError> {
        match self {
            RepodagError::Multiple(list) => list.iter().flat_map(|e| e.errors()).collect(),
            other => vec![other],
        }
    }
}

/// Fold `err` into an optional accumulated error.
///
/// The first error is kept as-is; further ones turn the accumulator into a
/// flat [`RepodagError::Multiple`].
pub fn combine(acc: Option<RepodagError>, err: RepodagError) -> RepodagError {
    match (acc, err) {
        (None, err) => err,
        (Some(RepodagError::Multiple(mut list)), RepodagError::Multiple(more)) => {
            list.extend(more);
            RepodagError::Multiple(list)
        }
        (Some(RepodagError::Multiple(mut list)), err) => {
            list.push(err);
            RepodagError::Multiple(list)
        }
        (Some(prev), RepodagError::Multiple(mut more)) => {
            more.insert(0, prev);
            RepodagError::Multiple(more)
        }
        (Some(prev), err) => RepodagError::Multiple(vec![prev, err]),
    }
}

/// Turn a list of collected errors into a single result.
pub fn into_result(errors: Vec<RepodagError>) -> Result<()> {
    let mut acc = None;
    for err in errors {
        acc = Some(combine(acc, err));
    }
    match acc {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

struct MultiDisplay<'a>(&'a [RepodagError]);

impl fmt::Display for MultiDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} errors occurred:", self.0.len())?;
        for (i, err) in self.0.iter().enumerate() {
            write!(f, "\n  {}. {}", i + 1, err)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combine_keeps_single_error_unwrapped() {
        let err = combine(None, RepodagError::ConfigError("a".into()));
        assert!(matches!(err, RepodagError::ConfigError(_)));
    }

    #[test]
    fn combine_flattens_into_multiple() {
        let err = combine(None, RepodagError::ConfigError("a".into()));
        let err = combine(Some(err), RepodagError::ConfigError("b".into()));
        let err = combine(Some(err), RepodagError::ConfigError("c".into()));

        assert_eq!(err.errors().len(), 3);
        let text = err.to_string();
        assert!(text.contains("3 errors occurred"));
        assert!(text.contains("1. Configuration error: a"));
        assert!(text.contains("3. Configuration error: c"));
    }

    #[test]
    fn into_result_is_ok_without_errors() {
        assert!(into_result(Vec::new()).is_ok());
    }
}
