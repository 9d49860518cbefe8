//! Token resolution: one [`Token`] → one executable [`Action`].
//!
//! Special tokens are classified in a fixed priority order: delay
//! directive, entry placeholder, escaped literal, named key. Anything left
//! over is unsupported on the active backend.

use std::borrow::Cow;
use std::time::Duration;

use bwm_core::VaultEntryView;

use crate::error::AutotypeError;
use crate::keys::{KeyTable, NamedKey, NativeKey};
use crate::tokenizer::Token;
use crate::totp;

/// A resolved instruction for the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action<'a> {
    /// Type this text verbatim. May be empty for missing entry fields.
    Type(Cow<'a, str>),
    Tap { key: NamedKey, native: NativeKey },
    /// Suspend dispatch. Only honoured when executed.
    Delay(Duration),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    Title,
    Username,
    Password,
    Url,
    Notes,
    Totp,
    CardNumber,
}

impl Placeholder {
    pub fn parse(raw: &str) -> Option<Placeholder> {
        let placeholder = match raw {
            "{TITLE}" => Placeholder::Title,
            "{USERNAME}" => Placeholder::Username,
            "{PASSWORD}" => Placeholder::Password,
            "{URL}" => Placeholder::Url,
            "{NOTES}" => Placeholder::Notes,
            "{TOTP}" => Placeholder::Totp,
            "{CARDNUM}" => Placeholder::CardNumber,
            _ => return None,
        };
        Some(placeholder)
    }
}

/// Bracketed names that stand for a sigil or bracket typed as text.
pub fn escaped_literal(raw: &str) -> Option<&'static str> {
    let literal = match raw {
        "{PLUS}" | "{+}" => "+",
        "{PERCENT}" | "{%}" => "%",
        "{CARET}" | "{^}" => "^",
        "{TILDE}" | "{~}" => "~",
        "{AT}" | "{@}" => "@",
        "{LEFTPAREN}" | "{(}" => "(",
        "{RIGHTPAREN}" | "{)}" => ")",
        "{LEFTBRACE}" | "{{}" => "{",
        "{RIGHTBRACE}" | "{}}" => "}",
        "{[}" => "[",
        "{]}" => "]",
        _ => return None,
    };
    Some(literal)
}

/// `{DELAY 250}` → 250 ms. Only plain decimal digits are accepted.
pub fn delay(raw: &str) -> Option<Duration> {
    let digits = raw.strip_prefix("{DELAY ")?.strip_suffix('}')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok().map(Duration::from_millis)
}

/// Resolves tokens against one entry and one backend's key table.
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'e> {
    entry: VaultEntryView<'e>,
    table: &'static KeyTable,
}

impl<'e> Resolver<'e> {
    pub fn new(entry: VaultEntryView<'e>, table: &'static KeyTable) -> Self {
        Self { entry, table }
    }

    pub fn resolve<'a>(&self, token: Token<'a>) -> Result<Action<'a>, AutotypeError>
    where
        'e: 'a,
    {
        let raw = match token {
            Token::Literal(text) => return Ok(Action::Type(Cow::Borrowed(text))),
            Token::Special(raw) => raw,
        };

        if let Some(duration) = delay(raw) {
            return Ok(Action::Delay(duration));
        }
        if let Some(placeholder) = Placeholder::parse(raw) {
            return self.placeholder(placeholder).map(Action::Type);
        }
        if let Some(literal) = escaped_literal(raw) {
            return Ok(Action::Type(Cow::Borrowed(literal)));
        }

        let unsupported = || AutotypeError::UnsupportedToken {
            backend: self.table.backend,
            token: raw.to_string(),
        };
        let key = NamedKey::parse(raw).ok_or_else(unsupported)?;
        match self.table.get(key).ok_or_else(unsupported)? {
            NativeKey::Text(text) => Ok(Action::Type(Cow::Borrowed(text))),
            native => Ok(Action::Tap { key, native }),
        }
    }

    fn placeholder(&self, placeholder: Placeholder) -> Result<Cow<'e, str>, AutotypeError> {
        let entry = &self.entry;
        let field = match placeholder {
            Placeholder::Title => Some(entry.title),
            Placeholder::Username => entry.username,
            Placeholder::Password => entry.password,
            Placeholder::Url => entry.url,
            Placeholder::Notes => entry.notes,
            Placeholder::CardNumber => entry.card_number,
            Placeholder::Totp => {
                return match entry.totp.filter(|t| !t.trim().is_empty()) {
                    Some(stored) => Ok(Cow::Owned(totp::generate_now(stored)?)),
                    None => Ok(Cow::Borrowed("")),
                };
            }
        };
        Ok(Cow::Borrowed(field.unwrap_or("")))
    }
}
