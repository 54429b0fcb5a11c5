// src/tags/mod.rs

//! Boolean tag expressions used by `include.tagExpr` on steps.
//!
//! Grammar (lowest to highest precedence):
//!
//! ```text
//! expr    := or
//! or      := and ( "||" and )*
//! and     := unary ( "&&" unary )*
//! unary   := "!" unary | primary
//! primary := TAG | "(" expr ")"
//! ```
//!
//! Tags are normalised on both sides: lower-cased, with `-` turned into `.`.

mod lexer;
mod parser;

use std::collections::BTreeSet;
use std::fmt;

pub use self::lexer::{LexError, Lexer, Token};
pub use self::parser::{ParseError, Parser, TagNode};

/// Normalise a tag name.
pub fn normalize_tag(tag: &str) -> String {
    tag.trim().to_lowercase().replace('-', ".")
}

/// Tags of the current invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagSet {
    tags: BTreeSet<String>,
}

impl TagSet {
    pub fn new<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            tags: tags
                .into_iter()
                .map(|t| normalize_tag(t.as_ref()))
                .filter(|t| !t.is_empty())
                .collect(),
        }
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.tags.iter().map(String::as_str)
    }
}

/// A compiled tag expression.
#[derive(Debug, Clone, PartialEq)]
pub struct TagExpr {
    source: String,
    root: TagNode,
}

impl TagExpr {
    pub fn parse(source: &str) -> Result<Self, ParseError> {
        let root = Parser::new(source)?.parse()?;
        Ok(Self {
            source: source.to_string(),
            root,
        })
    }

    pub fn matches(&self, tags: &TagSet) -> bool {
        self.root.eval(tags)
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

impl fmt::Display for TagExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_are_normalised() {
        let set = TagSet::new(["Do-Echo", " ci "]);
        assert!(set.contains("do.echo"));
        assert!(set.contains("ci"));
    }

    #[test]
    fn exclusion_expression() {
        let expr = TagExpr::parse("do-echo && !skip").unwrap();
        assert!(expr.matches(&TagSet::new(["do-echo"])));
        assert!(!expr.matches(&TagSet::new(["do-echo", "skip"])));
        assert!(!expr.matches(&TagSet::default()));
    }

    #[test]
    fn precedence_and_parentheses() {
        let expr = TagExpr::parse("a || b && c").unwrap();
        assert!(expr.matches(&TagSet::new(["a"])));
        assert!(!expr.matches(&TagSet::new(["b"])));

        let grouped = TagExpr::parse("(a || b) && c").unwrap();
        assert!(!grouped.matches(&TagSet::new(["a"])));
        assert!(grouped.matches(&TagSet::new(["b", "c"])));
    }

    #[test]
    fn double_negation() {
        let expr = TagExpr::parse("!!x").unwrap();
        assert!(expr.matches(&TagSet::new(["x"])));
    }

    #[test]
    fn invalid_expressions_are_rejected() {
        for bad in ["", "a &&", "(a", "a b", "a & b", "a)", "A$"] {
            assert!(TagExpr::parse(bad).is_err(), "expected error for {bad:?}");
        }
    }
}
