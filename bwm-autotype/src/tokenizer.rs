//! Sequence tokenizer: autotype template → lazy stream of tokens.
//!
//! Sigils are `{ + ^ % ~ @`. The single-character modifiers become one-char
//! special tokens; `{` opens a bracketed directive running to the next `}`.
//! `{}}` is a single escaped right brace. Every character of the input is
//! covered by exactly one token's raw text.

use crate::error::TokenizeError;

const SIGILS: &[char] = &['{', '+', '^', '%', '~', '@'];
const MODIFIERS: &[char] = &['+', '^', '%', '~', '@'];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token<'a> {
    Literal(&'a str),
    Special(&'a str),
}

impl<'a> Token<'a> {
    /// Source text this token was cut from.
    pub fn raw(&self) -> &'a str {
        match self {
            Token::Literal(raw) | Token::Special(raw) => raw,
        }
    }

    pub fn is_special(&self) -> bool {
        matches!(self, Token::Special(_))
    }
}

/// Single-pass token iterator. After yielding an error it yields nothing.
#[derive(Debug, Clone)]
pub struct Tokenizer<'a> {
    rest: &'a str,
    failed: bool,
}

pub fn tokenize(template: &str) -> Tokenizer<'_> {
    Tokenizer {
        rest: template,
        failed: false,
    }
}

impl<'a> Tokenizer<'a> {
    fn advance(&mut self, len: usize) -> &'a str {
        let (head, tail) = self.rest.split_at(len);
        self.rest = tail;
        head
    }
}

impl<'a> Iterator for Tokenizer<'a> {
    type Item = Result<Token<'a>, TokenizeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.rest.is_empty() {
            return None;
        }

        let Some(open) = self.rest.find(SIGILS) else {
            let len = self.rest.len();
            return Some(Ok(Token::Literal(self.advance(len))));
        };
        if open > 0 {
            return Some(Ok(Token::Literal(self.advance(open))));
        }

        // All sigils are ASCII, so byte 0 is the whole sigil.
        if self.rest.starts_with(MODIFIERS) {
            return Some(Ok(Token::Special(self.advance(1))));
        }

        let Some(close) = self.rest.find('}') else {
            self.failed = true;
            return Some(Err(TokenizeError {
                fragment: self.rest.to_string(),
            }));
        };
        if close == 1 && self.rest[2..].starts_with('}') {
            return Some(Ok(Token::Special(self.advance(3))));
        }
        Some(Ok(Token::Special(self.advance(close + 1))))
    }
}
