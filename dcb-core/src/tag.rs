//! Tags annotate events for predicate matching.
//!
//! A tag is a `key:value` pair. Event tags form an ordered set: duplicate
//! keys within one event are forbidden and insertion order is preserved so
//! encoding is deterministic. Tags are opaque — construct them only through
//! [`Tag::new`], never by building the struct literal directly.
use std::fmt::{self, Display, Formatter};

use crate::error::ValidationError;

/// A single `key:value` annotation on an event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct Tag {
    key: String,
    value: String,
}

impl Tag {
    /// Creates a new tag, rejecting empty keys or values.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Result<Self, ValidationError> {
        let key = key.into();
        let value = value.into();
        if key.is_empty() {
            return Err(ValidationError::new("tag.key", "tag key must not be empty"));
        }
        if value.is_empty() {
            return Err(ValidationError::new(
                "tag.value",
                "tag value must not be empty",
            ));
        }
        Ok(Self { key, value })
    }

    /// The tag's key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The tag's value.
    pub fn value(&self) -> &str {
        &self.value
    }
}

impl Display for Tag {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.key, self.value)
    }
}

/// Validates that a set of tags has no duplicate keys.
///
/// Tag-level validity (non-empty key/value) is already enforced by
/// [`Tag::new`]; this only checks the set-level invariant I4.
pub fn validate_unique_keys(tags: &[Tag]) -> Result<(), ValidationError> {
    let mut seen = std::collections::HashSet::with_capacity(tags.len());
    for tag in tags {
        if !seen.insert(tag.key()) {
            return Err(ValidationError::new(
                "tags",
                format!("duplicate tag key: {}", tag.key()),
            ));
        }
    }
    Ok(())
}

/// Returns true if `tags` contains every tag in `required` (set containment).
pub fn contains_all(tags: &[Tag], required: &[Tag]) -> bool {
    required.iter().all(|r| tags.contains(r))
}
