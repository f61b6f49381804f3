//! The query model: a predicate AST over event type and tags, compiled by
//! a backend into a scan filter.
//!
//! A [`Query`] is a disjunction (`OR`) of [`QueryItem`]s; a `QueryItem` is a
//! conjunction (`AND`) of an event-type set and a tag set. Both `Query` and
//! `QueryItem` are opaque — built only through [`Query::build`] and friends,
//! read only through accessors — so callers can never construct an invalid
//! predicate by hand.
use crate::error::ValidationError;
use crate::tag::{self, Tag};

/// One conjunctive clause of a [`Query`]: `(types ⊆ event.type) ∧ (tags ⊆ event.tags)`.
///
/// An empty `types` matches any event type; an empty `tags` matches any tag
/// set. A `QueryItem` with both empty is the universal matcher.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct QueryItem {
    types: Vec<String>,
    tags: Vec<Tag>,
}

impl QueryItem {
    /// Creates a query item requiring event type membership in `types` and
    /// tag-set containment of `tags`. Either (or both) may be empty.
    pub fn new(
        types: impl IntoIterator<Item = impl Into<String>>,
        tags: impl IntoIterator<Item = Tag>,
    ) -> Result<Self, ValidationError> {
        let types: Vec<String> = types.into_iter().map(Into::into).collect();
        for ty in &types {
            if ty.is_empty() {
                return Err(ValidationError::new(
                    "query_item.types",
                    "event type must not be empty",
                ));
            }
        }
        let tags: Vec<Tag> = tags.into_iter().collect();
        tag::validate_unique_keys(&tags)?;
        Ok(Self { types, tags })
    }

    /// The event types this item matches (empty means "any type").
    pub fn types(&self) -> &[String] {
        &self.types
    }

    /// The tags this item requires (empty means "any tags").
    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    /// Whether `event_type`/`event_tags` satisfy this item's predicate.
    pub fn matches(&self, event_type: &str, event_tags: &[Tag]) -> bool {
        let type_matches = self.types.is_empty() || self.types.iter().any(|t| t == event_type);
        let tags_match = tag::contains_all(event_tags, &self.tags);
        type_matches && tags_match
    }
}

/// A disjunction of [`QueryItem`]s.
///
/// An empty query is invalid for read/project (spec.md §3) but valid as the
/// `fail_if_events_match` predicate of an [`crate::AppendCondition`], where
/// it means "no predicate".
#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub struct Query(Vec<QueryItem>);

impl Query {
    /// Builds a query from one or more items.
    pub fn build(items: impl IntoIterator<Item = QueryItem>) -> Self {
        Self(items.into_iter().collect())
    }

    /// Builds the "match everything" query: a single item with no type or
    /// tag constraints.
    pub fn build_all() -> Self {
        Self(vec![QueryItem {
            types: Vec::new(),
            tags: Vec::new(),
        }])
    }

    /// Builds the empty query (no items). Only valid as an `AppendCondition`
    /// predicate, meaning "no predicate" — never as a read/project query.
    pub fn build_empty() -> Self {
        Self(Vec::new())
    }

    /// The disjuncts making up this query.
    pub fn items(&self) -> &[QueryItem] {
        &self.0
    }

    /// True if this query has no items.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Validates the query for use as a read/project predicate: it must have
    /// at least one item (emptiness is checked by the caller, since it's
    /// legal in the `AppendCondition` context but not here).
    pub fn validate_for_read(&self) -> Result<(), ValidationError> {
        if self.0.is_empty() {
            return Err(ValidationError::new(
                "query",
                "a query used for read or projection must have at least one item",
            ));
        }
        Ok(())
    }

    /// Whether `event_type`/`event_tags` satisfy any item of this query.
    pub fn matches(&self, event_type: &str, event_tags: &[Tag]) -> bool {
        self.0.iter().any(|item| item.matches(event_type, event_tags))
    }

    /// Returns the union of this query with `other`: every item of both,
    /// flattened into one top-level disjunction. Used by the projection
    /// engine to combine N projectors' queries into a single scan predicate.
    pub fn union(queries: impl IntoIterator<Item = Query>) -> Self {
        let mut items = Vec::new();
        for q in queries {
            items.extend(q.0);
        }
        Self(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag(k: &str, v: &str) -> Tag {
        Tag::new(k, v).unwrap()
    }

    #[test]
    fn it_rejects_empty_type_string_within_an_item() {
        assert!(QueryItem::new([""], []).is_err());
    }

    #[test]
    fn an_item_with_no_types_and_no_tags_matches_everything() {
        let item = QueryItem::new(Vec::<String>::new(), []).unwrap();
        assert!(item.matches("AnyType", &[]));
        assert!(item.matches("AnyType", &[tag("a", "1")]));
    }

    #[test]
    fn tag_matching_is_containment_not_equality() {
        let item = QueryItem::new(["X"], [tag("a", "1")]).unwrap();
        assert!(item.matches("X", &[tag("a", "1"), tag("b", "2")]));
        assert!(!item.matches("X", &[tag("b", "2")]));
    }

    #[test]
    fn build_all_matches_every_event() {
        let q = Query::build_all();
        assert!(q.matches("Anything", &[tag("x", "1")]));
        assert!(q.matches("Other", &[]));
    }

    #[test]
    fn empty_query_is_invalid_for_read_but_constructible() {
        let q = Query::build_empty();
        assert!(q.is_empty());
        assert!(q.validate_for_read().is_err());
    }

    #[test]
    fn union_flattens_items_from_all_queries() {
        let q1 = Query::build([QueryItem::new(["A"], []).unwrap()]);
        let q2 = Query::build([QueryItem::new(["B"], []).unwrap()]);
        let combined = Query::union([q1, q2]);
        assert_eq!(combined.items().len(), 2);
        assert!(combined.matches("A", &[]));
        assert!(combined.matches("B", &[]));
        assert!(!combined.matches("C", &[]));
    }

    #[test]
    fn query_roundtrips_through_json() {
        let q = Query::build([QueryItem::new(["CourseDefined"], [tag("course_id", "c1")]).unwrap()]);
        let json = serde_json::to_string(&q).unwrap();
        let back: Query = serde_json::from_str(&json).unwrap();
        assert_eq!(q, back);
    }
}
