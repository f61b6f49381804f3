//! Compiles a `dcb_core::Query` (plus an optional cursor) into a SQL
//! predicate over the `event` table.
//!
//! Tag containment is expressed with Postgres's array containment operator
//! (`tags @> ARRAY[...]`), backed by the GIN index the migrator creates;
//! type membership uses `= ANY(...)`. Everything is bound through
//! `sqlx::QueryBuilder` rather than interpolated into the SQL string, so a
//! tag value or event type containing SQL metacharacters can never change
//! the shape of the query.
use dcb_core::{Cursor, Query, QueryItem};
use sqlx::{Postgres, QueryBuilder};

/// Appends `(transaction_id, position) > (tx, pos)` to `builder`.
pub fn push_cursor_predicate(builder: &mut QueryBuilder<'_, Postgres>, cursor: Cursor) {
    builder.push("(transaction_id, position) > (");
    builder.push_bind(cursor.transaction_id() as i64);
    builder.push(", ");
    builder.push_bind(cursor.position());
    builder.push(")");
}

fn push_item_predicate(builder: &mut QueryBuilder<'_, Postgres>, item: &QueryItem) {
    builder.push("(");
    let mut wrote = false;

    if !item.types().is_empty() {
        builder.push("event_type = ANY(");
        builder.push_bind(item.types().to_vec());
        builder.push(")");
        wrote = true;
    }

    if !item.tags().is_empty() {
        if wrote {
            builder.push(" AND ");
        }
        builder.push("tags @> ");
        let tag_strings: Vec<String> = item.tags().iter().map(|t| t.to_string()).collect();
        builder.push_bind(tag_strings);
        wrote = true;
    }

    if !wrote {
        builder.push("TRUE");
    }
    builder.push(")");
}

/// Appends the compiled form of `query` to `builder`.
///
/// An empty query (no items) compiles to `TRUE` — the universal matcher.
/// For a read/projection scan this is dead code because `Query::
/// validate_for_read` rejects empty queries upstream; it is live for an
/// `AppendCondition`'s `fail_if_events_match`, where spec.md §3 defines an
/// empty query as meaning "no predicate", i.e. every event matches and only
/// the cursor restricts the check.
pub fn push_query_predicate(builder: &mut QueryBuilder<'_, Postgres>, query: &Query) {
    if query.items().is_empty() {
        builder.push("TRUE");
        return;
    }

    builder.push("(");
    let mut items = query.items().iter().peekable();
    while let Some(item) = items.next() {
        push_item_predicate(builder, item);
        if items.peek().is_some() {
            builder.push(" OR ");
        }
    }
    builder.push(")");
}

/// Appends the full `WHERE` predicate for a scan to `builder`: the query,
/// additionally restricted to events strictly after `after` if given.
///
/// Always appends into the caller's own `QueryBuilder` rather than building
/// a standalone one and splicing its `.sql()` text in: bound arguments live
/// in the builder they were pushed into, so composing two separately-built
/// queries by concatenating their SQL strings would silently drop the
/// binds and misnumber the placeholders.
pub fn push_scan_predicate(builder: &mut QueryBuilder<'_, Postgres>, query: &Query, after: Option<Cursor>) {
    match after {
        Some(cursor) => {
            builder.push("(");
            push_cursor_predicate(builder, cursor);
            builder.push(" AND ");
            push_query_predicate(builder, query);
            builder.push(")");
        }
        None => push_query_predicate(builder, query),
    }
}

/// Builds the full `WHERE` predicate for a scan as a standalone query. Used
/// where the predicate is the entire statement (tests, or a caller that
/// only needs the predicate in isolation) rather than spliced into a larger
/// one — see [`push_scan_predicate`] for composition into a bigger builder.
pub fn build_scan_predicate(query: &Query, after: Option<Cursor>) -> QueryBuilder<'static, Postgres> {
    let mut builder = QueryBuilder::new("");
    push_scan_predicate(&mut builder, query, after);
    builder
}

#[cfg(test)]
mod tests {
    use super::*;
    use dcb_core::{QueryItem, Tag};

    fn tag(k: &str, v: &str) -> Tag {
        Tag::new(k, v).unwrap()
    }

    #[test]
    fn it_compiles_a_type_only_item() {
        let query = Query::build([QueryItem::new(["CourseDefined"], []).unwrap()]);
        let builder = build_scan_predicate(&query, None);
        assert_eq!(builder.sql(), "(event_type = ANY($1))");
    }

    #[test]
    fn it_compiles_type_and_tags_conjunction() {
        let query = Query::build([
            QueryItem::new(["CourseDefined"], [tag("course_id", "c1")]).unwrap(),
        ]);
        let builder = build_scan_predicate(&query, None);
        assert_eq!(builder.sql(), "(event_type = ANY($1) AND tags @> $2)");
    }

    #[test]
    fn it_compiles_disjunction_of_items() {
        let query = Query::build([
            QueryItem::new(["A"], []).unwrap(),
            QueryItem::new(["B"], []).unwrap(),
        ]);
        let builder = build_scan_predicate(&query, None);
        assert_eq!(builder.sql(), "((event_type = ANY($1)) OR (event_type = ANY($2)))");
    }

    #[test]
    fn it_adds_the_cursor_predicate_when_after_is_given() {
        let query = Query::build([QueryItem::new(["A"], []).unwrap()]);
        let builder = build_scan_predicate(&query, Some(Cursor::new(5, 10)));
        assert_eq!(
            builder.sql(),
            "((transaction_id, position) > ($1, $2) AND (event_type = ANY($3)))"
        );
    }

    #[test]
    fn empty_query_compiles_to_true() {
        let query = Query::build_empty();
        let builder = build_scan_predicate(&query, None);
        assert_eq!(builder.sql(), "TRUE");
    }

    #[test]
    fn an_item_with_no_types_or_tags_compiles_to_true() {
        let query = Query::build_all();
        let builder = build_scan_predicate(&query, None);
        assert_eq!(builder.sql(), "(TRUE)");
    }
}
