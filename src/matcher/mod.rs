// src/matcher/mod.rs

//! Path and pattern matching.
//!
//! - [`regex`] compiles lists of regular expressions (with an optional
//!   full-match wrap) through a process-wide cache and splits `!`-prefixed
//!   exclude patterns from includes.
//! - [`glob`] builds include/exclude glob filters, used to select
//!   components by name.

pub mod glob;
pub mod regex;

pub use self::glob::GlobFilter;
pub use self::regex::{cached_regex, split_patterns, CompiledList};
