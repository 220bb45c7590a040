//! # Subjects
//!
//! Typed, validated subject strings with prefix and wildcard helpers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::BusError;

/// Single-token wildcard.
pub const WILDCARD_TOKEN: &str = "*";

/// Tail wildcard, valid only as the last token.
pub const WILDCARD_TAIL: &str = ">";

/// A dot-delimited subject such as `ROUTER.EHSAN.HELLO` or `NESTED-000.>`.
///
/// A subject is never empty, never contains an empty token, never contains
/// whitespace, and only uses `>` as its last token.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Subject(String);

impl Subject {
    /// Parse and validate a subject.
    pub fn new(raw: impl Into<String>) -> Result<Self, BusError> {
        let raw = raw.into();
        validate(&raw)?;
        Ok(Self(raw))
    }

    /// The subject as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Iterate over the dot-separated tokens.
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.0.split('.')
    }

    /// Whether the subject contains `*` or `>` and is therefore only usable
    /// for subscribing.
    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        self.tokens()
            .any(|token| token == WILDCARD_TOKEN || token == WILDCARD_TAIL)
    }

    /// Whether the subject starts with `prefix` and has at least one token
    /// after it. `prefix` carries its trailing dot (`"ROUTER."`).
    #[must_use]
    pub fn has_prefix(&self, prefix: &str) -> bool {
        self.0.len() > prefix.len() && self.0.starts_with(prefix)
    }

    /// The remainder of the subject after `prefix`, if it has that prefix.
    #[must_use]
    pub fn strip_prefix(&self, prefix: &str) -> Option<Subject> {
        if !self.has_prefix(prefix) {
            return None;
        }
        // A prefix ending in '.' leaves whole tokens behind, so the remainder
        // is valid whenever the original was.
        Subject::new(&self.0[prefix.len()..]).ok()
    }

    /// A new subject with `prefix` in front. A missing trailing dot on the
    /// prefix is supplied.
    pub fn prepend(&self, prefix: &str) -> Result<Subject, BusError> {
        if prefix.is_empty() {
            return Ok(self.clone());
        }
        if prefix.ends_with('.') {
            Subject::new(format!("{prefix}{}", self.0))
        } else {
            Subject::new(format!("{prefix}.{}", self.0))
        }
    }

    /// Whether this literal subject is matched by `pattern`.
    #[must_use]
    pub fn matches(&self, pattern: &Subject) -> bool {
        let mut literal = self.tokens();
        let mut pattern = pattern.tokens();
        loop {
            match (pattern.next(), literal.next()) {
                (Some(WILDCARD_TAIL), Some(_)) => return true,
                (Some(WILDCARD_TOKEN), Some(_)) => continue,
                (Some(expected), Some(actual)) if expected == actual => continue,
                (None, None) => return true,
                _ => return false,
            }
        }
    }
}

fn validate(raw: &str) -> Result<(), BusError> {
    let invalid = |reason| BusError::InvalidSubject {
        subject: raw.to_string(),
        reason,
    };

    if raw.is_empty() {
        return Err(invalid("empty subject"));
    }
    if raw.chars().any(char::is_whitespace) {
        return Err(invalid("whitespace in subject"));
    }

    let mut tokens = raw.split('.').peekable();
    while let Some(token) = tokens.next() {
        if token.is_empty() {
            return Err(invalid("empty token"));
        }
        if token == WILDCARD_TAIL && tokens.peek().is_some() {
            return Err(invalid("'>' must be the last token"));
        }
        if token.len() > 1 && (token.contains('*') || token.contains('>')) {
            return Err(invalid("wildcard mixed into a token"));
        }
    }
    Ok(())
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Subject {
    type Err = BusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Subject::new(s)
    }
}

impl TryFrom<String> for Subject {
    type Error = BusError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Subject::new(value)
    }
}

impl TryFrom<&str> for Subject {
    type Error = BusError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Subject::new(value)
    }
}

impl From<Subject> for String {
    fn from(subject: Subject) -> Self {
        subject.0
    }
}

impl AsRef<str> for Subject {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
