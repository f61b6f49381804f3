//! Events: the pre-persistence [`InputEvent`] and the persisted [`Event`].
use chrono::{DateTime, Utc};

use crate::cursor::Cursor;
use crate::error::ValidationError;
use crate::tag::{self, Tag};

/// An event before it has been written to the store.
///
/// Opaque: constructed only through [`InputEvent::new`], which enforces the
/// tag/type validation of spec.md §3 (I4) up front so a batch can be
/// rejected before any I/O is attempted.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct InputEvent {
    event_type: String,
    tags: Vec<Tag>,
    data: serde_json::Value,
}

impl InputEvent {
    /// Creates a new input event.
    ///
    /// `data` is already a parsed [`serde_json::Value`] — the boundary that
    /// decodes a caller's raw bytes into JSON (and rejects malformed JSON)
    /// is the caller's responsibility, not this constructor's; by the time
    /// `data` reaches here it is, by construction, valid JSON.
    pub fn new(
        event_type: impl Into<String>,
        tags: impl IntoIterator<Item = Tag>,
        data: serde_json::Value,
    ) -> Result<Self, ValidationError> {
        let event_type = event_type.into();
        if event_type.is_empty() {
            return Err(ValidationError::new(
                "event.type",
                "event type must not be empty",
            ));
        }
        let tags: Vec<Tag> = tags.into_iter().collect();
        tag::validate_unique_keys(&tags)?;
        Ok(Self {
            event_type,
            tags,
            data,
        })
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    pub fn data(&self) -> &serde_json::Value {
        &self.data
    }
}

/// An event as persisted in the store: an [`InputEvent`] plus the position
/// assigned to it at insert time.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Event {
    event_type: String,
    tags: Vec<Tag>,
    data: serde_json::Value,
    transaction_id: u64,
    position: i64,
    occurred_at: DateTime<Utc>,
}

impl Event {
    /// Assembles a persisted event from its input form plus the metadata a
    /// backend assigned at commit time. Only a backend implementation
    /// should call this — callers observe `Event`s, they never build them.
    pub fn from_input(
        input: InputEvent,
        transaction_id: u64,
        position: i64,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            event_type: input.event_type,
            tags: input.tags,
            data: input.data,
            transaction_id,
            position,
            occurred_at,
        }
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    pub fn data(&self) -> &serde_json::Value {
        &self.data
    }

    pub fn transaction_id(&self) -> u64 {
        self.transaction_id
    }

    pub fn position(&self) -> i64 {
        self.position
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    /// This event's position in the global order, as a cursor.
    pub fn cursor(&self) -> Cursor {
        Cursor::new(self.transaction_id, self.position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn it_rejects_empty_type() {
        assert!(InputEvent::new("", [], json!({})).is_err());
    }

    #[test]
    fn it_rejects_duplicate_tag_keys() {
        let tags = vec![Tag::new("a", "1").unwrap(), Tag::new("a", "2").unwrap()];
        assert!(InputEvent::new("X", tags, json!({})).is_err());
    }

    #[test]
    fn persisted_event_exposes_its_cursor() {
        let input = InputEvent::new("X", [], json!({"n": 1})).unwrap();
        let event = Event::from_input(input, 7, 42, Utc::now());
        assert_eq!(event.cursor(), Cursor::new(7, 42));
    }
}
