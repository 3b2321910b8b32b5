//! Notion page identifiers.
//!
//! Notion accepts identifiers in several spellings: bare 32-hex strings,
//! hyphenated UUIDs, or a page URL whose last path segment ends in the 32-hex
//! id. Everything inside the crate works with the lowercase hyphenated form.

use std::fmt;

use serde::Serialize;
use uuid::Uuid;

use super::error::DomainError;

const SIMPLE_LEN: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct PageId(String);

impl PageId {
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(DomainError::validation("page id must not be empty"));
        }

        let candidate = strip_url(trimmed);
        let uuid = Uuid::try_parse(candidate)
            .ok()
            .or_else(|| trailing_simple_id(candidate).and_then(|tail| Uuid::try_parse(tail).ok()))
            .ok_or_else(|| {
                DomainError::validation(format!("`{trimmed}` is not a Notion page id"))
            })?;

        Ok(Self(uuid.hyphenated().to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for PageId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

fn strip_url(value: &str) -> &str {
    let without_query = value.split(['?', '#']).next().unwrap_or(value);
    without_query
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(without_query)
}

/// Page URLs read `Some-Title-<32 hex>`; pick the hex tail.
fn trailing_simple_id(segment: &str) -> Option<&str> {
    if segment.len() < SIMPLE_LEN || !segment.is_ascii() {
        return None;
    }
    let tail = &segment[segment.len() - SIMPLE_LEN..];
    tail.chars()
        .all(|c| c.is_ascii_hexdigit())
        .then_some(tail)
}
