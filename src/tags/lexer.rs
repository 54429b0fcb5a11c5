// src/tags/lexer.rs

use std::fmt;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Tag(String),
    And,    // &&
    Or,     // ||
    Not,    // !
    LParen, // (
    RParen, // )
    Eof,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Tag(t) => write!(f, "{t}"),
            Token::And => write!(f, "&&"),
            Token::Or => write!(f, "||"),
            Token::Not => write!(f, "!"),
            Token::LParen => write!(f, "("),
            Token::RParen => write!(f, ")"),
            Token::Eof => write!(f, "end of expression"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("lex error at position {position}: {message}")]
pub struct LexError {
    pub message: String,
    pub position: usize,
}

pub struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    len: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            chars: input.char_indices().peekable(),
            len: input.len(),
        }
    }

    /// Tokenise the whole input; the last token is always [`Token::Eof`].
    pub fn tokenize(mut self) -> Result<Vec<(Token, usize)>, LexError> {
        let mut tokens = Vec::new();
        loop {
            let (token, pos) = self.next_token()?;
            let done = token == Token::Eof;
            tokens.push((token, pos));
            if done {
                return Ok(tokens);
            }
        }
    }

    fn next_token(&mut self) -> Result<(Token, usize), LexError> {
        while matches!(self.chars.peek(), Some((_, c)) if c.is_whitespace()) {
            self.chars.next();
        }

        let Some((pos, c)) = self.chars.next() else {
            return Ok((Token::Eof, self.len));
        };

        let token = match c {
            '(' => Token::LParen,
            ')' => Token::RParen,
            '!' => Token::Not,
            '&' => self.expect_second('&', pos, Token::And)?,
            '|' => self.expect_second('|', pos, Token::Or)?,
            c if is_tag_char(c) => {
                let mut tag = String::from(c);
                while let Some(&(_, next)) = self.chars.peek() {
                    if !is_tag_char(next) {
                        break;
                    }
                    tag.push(next);
                    self.chars.next();
                }
                Token::Tag(super::normalize_tag(&tag))
            }
            other => {
                return Err(LexError {
                    message: format!("unexpected character '{other}'"),
                    position: pos,
                });
            }
        };
        Ok((token, pos))
    }

    fn expect_second(&mut self, want: char, pos: usize, token: Token) -> Result<Token, LexError> {
        match self.chars.next() {
            Some((_, c)) if c == want => Ok(token),
            _ => Err(LexError {
                message: format!("expected '{want}{want}'"),
                position: pos,
            }),
        }
    }
}

fn is_tag_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_')
}
