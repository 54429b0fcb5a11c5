// src/matcher/regex.rs

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::{Mutex, OnceLock};

use anyhow::{Context, Result};
use regex::Regex;
use tracing::{trace, warn};

/// Process-local cache of compiled regexes keyed by their source text.
fn cache() -> &'static Mutex<HashMap<String, Regex>> {
    static CACHE: OnceLock<Mutex<HashMap<String, Regex>>> = OnceLock::new();
    CACHE.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Compile `pattern`, or return the copy compiled earlier in this process.
///
/// `Regex` clones share the compiled program, so handing out clones is cheap.
pub fn cached_regex(pattern: &str) -> Result<Regex> {
    let mut guard = cache().lock().unwrap_or_else(|e| e.into_inner());
    if let Some(re) = guard.get(pattern) {
        return Ok(re.clone());
    }

    trace!(pattern, "compiling regex");
    let re = Regex::new(pattern).with_context(|| format!("invalid regex pattern: {pattern}"))?;
    guard.insert(pattern.to_string(), re.clone());
    Ok(re)
}

/// An ordered list of compiled regexes.
#[derive(Clone, Default)]
pub struct CompiledList {
    patterns: Vec<Regex>,
}

impl fmt::Debug for CompiledList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.patterns.iter().map(|r| r.as_str()))
            .finish()
    }
}

impl PartialEq for CompiledList {
    fn eq(&self, other: &Self) -> bool {
        self.patterns.len() == other.patterns.len()
            && self
                .patterns
                .iter()
                .zip(other.patterns.iter())
                .all(|(a, b)| a.as_str() == b.as_str())
    }
}

impl CompiledList {
    /// Compile all `patterns`.
    ///
    /// With `full_match`, a pattern lacking a leading `^` or a trailing `$`
    /// is wrapped as `^(?:...)$` and a warning is logged.
    pub fn compile<S: AsRef<str>>(patterns: &[S], full_match: bool) -> Result<Self> {
        let mut compiled = Vec::with_capacity(patterns.len());
        for pat in patterns {
            let pat = pat.as_ref();
            let source = if full_match && !is_anchored(pat) {
                let wrapped = anchor_pattern(pat);
                warn!(
                    pattern = pat,
                    wrapped = %wrapped,
                    "pattern is not anchored; wrapping it for a full match"
                );
                wrapped
            } else {
                pat.to_string()
            };
            compiled.push(cached_regex(&source)?);
        }
        Ok(Self { patterns: compiled })
    }

    /// True if any pattern in the list matches `s`.
    pub fn matches_any(&self, s: &str) -> bool {
        self.patterns.iter().any(|re| re.is_match(s))
    }

    /// Match against the final component of `path` only.
    pub fn matches_file_name(&self, path: &Path) -> bool {
        path.file_name()
            .map(|name| self.matches_any(&name.to_string_lossy()))
            .unwrap_or(false)
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Source text of the compiled patterns.
    pub fn sources(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(|re| re.as_str())
    }
}

fn is_anchored(pattern: &str) -> bool {
    pattern.starts_with('^') && ends_with_unescaped_dollar(pattern)
}

fn ends_with_unescaped_dollar(pattern: &str) -> bool {
    if !pattern.ends_with('$') {
        return false;
    }
    let backslashes = pattern[..pattern.len() - 1]
        .chars()
        .rev()
        .take_while(|c| *c == '\\')
        .count();
    backslashes % 2 == 0
}

/// Wrap `pattern` so it has to match the whole input.
pub fn anchor_pattern(pattern: &str) -> String {
    let inner = pattern.strip_prefix('^').unwrap_or(pattern);
    let inner = if ends_with_unescaped_dollar(inner) {
        &inner[..inner.len() - 1]
    } else {
        inner
    };
    format!("^(?:{inner})$")
}

/// Split a pattern list into `(includes, excludes)`.
///
/// Entries starting with `!` are excludes; a leading `\!` stands for a
/// literal `!` at the start of an include.
pub fn split_patterns<S: AsRef<str>>(patterns: &[S]) -> (Vec<String>, Vec<String>) {
    let mut includes = Vec::new();
    let mut excludes = Vec::new();

    for pat in patterns {
        let pat = pat.as_ref();
        if let Some(rest) = pat.strip_prefix("\\!") {
            includes.push(format!("!{rest}"));
        } else if let Some(rest) = pat.strip_prefix('!') {
            excludes.push(rest.to_string());
        } else {
            includes.push(pat.to_string());
        }
    }

    (includes, excludes)
}
