//! The append condition: the predicate + cursor pair that guards an
//! `appendIf` call (spec.md §3, §4.2).
use crate::cursor::Cursor;
use crate::query::Query;

/// An optional predicate plus an optional cursor, whose conjunction, if it
/// matches any committed event, causes an append to fail.
///
/// - Both present: fails if any event matches `fail_if_events_match` **and**
///   lies strictly after `after_cursor`.
/// - Only `after_cursor`: fails if any event lies strictly after it (a
///   global optimistic lock).
/// - Only `fail_if_events_match`: fails if any event *ever* matches.
/// - Neither: the append is unconditional.
#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct AppendCondition {
    fail_if_events_match: Option<Query>,
    after_cursor: Option<Cursor>,
}

impl AppendCondition {
    /// The unconditional append condition (matches the "neither present" case).
    pub fn none() -> Self {
        Self::default()
    }

    /// Fails if any event matches `query`, regardless of position.
    pub fn fail_if_matches(query: Query) -> Self {
        Self {
            fail_if_events_match: Some(query),
            after_cursor: None,
        }
    }

    /// Fails if any event lies strictly after `cursor` (a global optimistic
    /// lock, independent of any predicate).
    pub fn fail_if_any_event_after(cursor: Cursor) -> Self {
        Self {
            fail_if_events_match: None,
            after_cursor: Some(cursor),
        }
    }

    /// Fails if any event matches `query` **and** lies strictly after `cursor`.
    pub fn fail_if_matches_after(query: Query, cursor: Cursor) -> Self {
        Self {
            fail_if_events_match: Some(query),
            after_cursor: Some(cursor),
        }
    }

    pub fn fail_if_events_match(&self) -> Option<&Query> {
        self.fail_if_events_match.as_ref()
    }

    pub fn after_cursor(&self) -> Option<Cursor> {
        self.after_cursor
    }

    /// Whether this condition imposes no constraint at all.
    pub fn is_unconditional(&self) -> bool {
        self.fail_if_events_match.is_none() && self.after_cursor.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::QueryItem;

    #[test]
    fn none_is_unconditional() {
        assert!(AppendCondition::none().is_unconditional());
    }

    #[test]
    fn fail_if_matches_after_carries_both_parts() {
        let q = Query::build([QueryItem::new(["X"], []).unwrap()]);
        let c = Cursor::new(1, 1);
        let cond = AppendCondition::fail_if_matches_after(q.clone(), c);
        assert_eq!(cond.fail_if_events_match(), Some(&q));
        assert_eq!(cond.after_cursor(), Some(c));
        assert!(!cond.is_unconditional());
    }
}
