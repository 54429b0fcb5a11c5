// src/tags/parser.rs

use thiserror::Error;

use super::TagSet;
use super::lexer::{LexError, Lexer, Token};

/// Syntax tree of a tag expression.
#[derive(Debug, Clone, PartialEq)]
pub enum TagNode {
    Tag(String),
    Not(Box<TagNode>),
    And(Box<TagNode>, Box<TagNode>),
    Or(Box<TagNode>, Box<TagNode>),
}

impl TagNode {
    pub fn eval(&self, tags: &TagSet) -> bool {
        match self {
            TagNode::Tag(t) => tags.contains(t),
            TagNode::Not(inner) => !inner.eval(tags),
            TagNode::And(l, r) => l.eval(tags) && r.eval(tags),
            TagNode::Or(l, r) => l.eval(tags) || r.eval(tags),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("parse error at position {position}: {message}")]
pub struct ParseError {
    pub message: String,
    pub position: usize,
}

impl From<LexError> for ParseError {
    fn from(e: LexError) -> Self {
        ParseError {
            message: e.message,
            position: e.position,
        }
    }
}

pub struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
}

impl Parser {
    pub fn new(input: &str) -> Result<Self, ParseError> {
        Ok(Self {
            tokens: Lexer::new(input).tokenize()?,
            pos: 0,
        })
    }

    pub fn parse(mut self) -> Result<TagNode, ParseError> {
        let node = self.parse_or()?;
        match self.peek() {
            Token::Eof => Ok(node),
            other => Err(self.error(format!("unexpected '{other}'"))),
        }
    }

    fn parse_or(&mut self) -> Result<TagNode, ParseError> {
        let mut left = self.parse_and()?;
        while *self.peek() == Token::Or {
            self.advance();
            let right = self.parse_and()?;
            left = TagNode::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<TagNode, ParseError> {
        let mut left = self.parse_unary()?;
        while *self.peek() == Token::And {
            self.advance();
            let right = self.parse_unary()?;
            left = TagNode::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<TagNode, ParseError> {
        if *self.peek() == Token::Not {
            self.advance();
            let inner = self.parse_unary()?;
            return Ok(TagNode::Not(Box::new(inner)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<TagNode, ParseError> {
        match self.peek().clone() {
            Token::Tag(tag) => {
                self.advance();
                Ok(TagNode::Tag(tag))
            }
            Token::LParen => {
                self.advance();
                let inner = self.parse_or()?;
                if *self.peek() != Token::RParen {
                    return Err(self.error("expected ')'".to_string()));
                }
                self.advance();
                Ok(inner)
            }
            other => Err(self.error(format!("expected a tag, found '{other}'"))),
        }
    }

    fn peek(&self) -> &Token {
        // `tokenize` always ends with Eof, and `advance` never moves past it.
        &self.tokens[self.pos].0
    }

    fn advance(&mut self) {
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
    }

    fn error(&self, message: String) -> ParseError {
        ParseError {
            message,
            position: self.tokens[self.pos].1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_left_associative_tree() {
        let node = Parser::new("a && b && c").unwrap().parse().unwrap();
        let expected = TagNode::And(
            Box::new(TagNode::And(
                Box::new(TagNode::Tag("a".into())),
                Box::new(TagNode::Tag("b".into())),
            )),
            Box::new(TagNode::Tag("c".into())),
        );
        assert_eq!(node, expected);
    }

    #[test]
    fn reports_position_of_unexpected_token() {
        let err = Parser::new("a b").unwrap().parse().unwrap_err();
        assert_eq!(err.position, 2);
    }
}
