// src/git.rs

//! The narrow Git interface used for ignore checks and change detection.

use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use anyhow::{bail, Context, Result};
use tracing::{debug, trace};

/// Decides whether discovery should skip a descriptor file.
pub trait IgnoreOracle: Send + Sync + Debug {
    fn is_ignored(&self, path: &Path) -> bool;
}

/// Never ignores anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoIgnore;

impl IgnoreOracle for NoIgnore {
    fn is_ignored(&self, _path: &Path) -> bool {
        false
    }
}

/// Asks `git check-ignore` inside `root`.
#[derive(Debug, Clone)]
pub struct GitIgnoreOracle {
    root: PathBuf,
}

impl GitIgnoreOracle {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl IgnoreOracle for GitIgnoreOracle {
    fn is_ignored(&self, path: &Path) -> bool {
        match is_ignored(&self.root, path) {
            Ok(ignored) => ignored,
            Err(err) => {
                debug!(path = %path.display(), error = %err, "git check-ignore failed; not ignoring");
                false
            }
        }
    }
}

fn git(root: &Path, args: &[&str]) -> Result<Output> {
    trace!(?args, root = %root.display(), "running git");
    Command::new("git")
        .args(args)
        .current_dir(root)
        .output()
        .with_context(|| format!("running git {}", args.join(" ")))
}

/// Whether Git ignores `path`. Outside a repository nothing is ignored.
pub fn is_ignored(root: &Path, path: &Path) -> Result<bool> {
    let path = path.to_string_lossy();
    let out = git(root, &["check-ignore", "-q", "--", path.as_ref()])?;
    match out.status.code() {
        Some(0) => Ok(true),
        Some(1) => Ok(false),
        // 128: not a repository, or another fatal condition.
        _ => {
            debug!(
                stderr = %String::from_utf8_lossy(&out.stderr).trim(),
                "git check-ignore did not answer; treating path as not ignored"
            );
            Ok(false)
        }
    }
}

/// Absolute paths changed since `since`, including untracked files.
pub fn changed_files(root: &Path, since: &str) -> Result<Vec<PathBuf>> {
    let toplevel = toplevel(root)?;

    let mut files = list(&toplevel, &["diff", "--name-only", since])?;
    files.extend(list(&toplevel, &["ls-files", "--others", "--exclude-standard"])?);
    files.sort();
    files.dedup();

    debug!(since, count = files.len(), "collected changed files from git");
    Ok(files.into_iter().map(|f| toplevel.join(f)).collect())
}

fn toplevel(root: &Path) -> Result<PathBuf> {
    let out = git(root, &["rev-parse", "--show-toplevel"])?;
    if !out.status.success() {
        bail!(
            "{} is not inside a git repository: {}",
            root.display(),
            String::from_utf8_lossy(&out.stderr).trim()
        );
    }
    Ok(PathBuf::from(String::from_utf8_lossy(&out.stdout).trim()))
}

fn list(root: &Path, args: &[&str]) -> Result<Vec<String>> {
    let out = git(root, args)?;
    if !out.status.success() {
        bail!(
            "git {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&out.stderr).trim()
        );
    }
    Ok(String::from_utf8_lossy(&out.stdout)
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect())
}
