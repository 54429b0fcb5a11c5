// src/matcher/glob.rs

use std::fmt;

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};

/// Include/exclude glob filter.
///
/// Patterns prefixed with `!` exclude. Without any include pattern every
/// name is included unless excluded.
#[derive(Clone)]
pub struct GlobFilter {
    include_set: Option<GlobSet>,
    exclude_set: Option<GlobSet>,
    patterns: Vec<String>,
}

impl fmt::Debug for GlobFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlobFilter")
            .field("patterns", &self.patterns)
            .finish_non_exhaustive()
    }
}

impl GlobFilter {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let mut includes = Vec::new();
        let mut excludes = Vec::new();
        for pat in patterns {
            let pat = pat.as_ref();
            match pat.strip_prefix('!') {
                Some(rest) => excludes.push(rest.to_string()),
                None => includes.push(pat.to_string()),
            }
        }

        Ok(Self {
            include_set: build_optional_globset(&includes).context("building include globset")?,
            exclude_set: build_optional_globset(&excludes).context("building exclude globset")?,
            patterns: patterns.iter().map(|p| p.as_ref().to_string()).collect(),
        })
    }

    /// Returns true if `name` is included and not excluded.
    pub fn matches(&self, name: &str) -> bool {
        if let Some(include) = &self.include_set {
            if !include.is_match(name) {
                return false;
            }
        }
        if let Some(exclude) = &self.exclude_set {
            if exclude.is_match(name) {
                return false;
            }
        }
        true
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}

fn build_optional_globset(patterns: &[String]) -> Result<Option<GlobSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob = Glob::new(pat).with_context(|| format!("invalid glob pattern: {pat}"))?;
        builder.add(glob);
    }
    Ok(Some(builder.build()?))
}
