//! The read pipeline: compiles a query into a scan, applies the commit-order
//! watermark described in `migrator.rs`, and relays rows to the caller
//! through a bounded channel.
//!
//! Grounded on `PgEventStore::stream_with`'s use of `async-stream`'s
//! `stream!` macro to turn a row-by-row `sqlx` scan into a
//! `futures::Stream`. The extra bounded channel the teacher's version does
//! not have is a supplement: it lets the database-reading task run ahead of
//! a slow consumer up to `StoreConfig::stream_buffer` rows, rather than
//! having the consumer's poll directly drive each row fetch.
use async_stream::stream;
use dcb_core::{Cursor, Query, StoreConfig};
use futures::stream::BoxStream;
use futures::StreamExt;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tokio::sync::mpsc;

use crate::error::Error;
use crate::insert::row_to_event;
use crate::query_builder::push_scan_predicate;

/// The oldest transaction id guaranteed to have already committed or
/// aborted as of this statement's snapshot. Rows stamped with a
/// `transaction_id` at or above this watermark are withheld until a later
/// scan, so an in-flight transaction can never be "lapped" by one that
/// started after it but committed first.
const WATERMARK_EXPR: &str = "pg_snapshot_xmin(pg_current_snapshot())";

fn build_scan_statement(query: &Query, after: Option<Cursor>) -> QueryBuilder<'static, Postgres> {
    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(
        "SELECT transaction_id, position, event_type, tags, data, occurred_at FROM event WHERE transaction_id < ",
    );
    builder.push(WATERMARK_EXPR);
    builder.push(" AND ");
    push_scan_predicate(&mut builder, query, after);
    builder.push(" ORDER BY transaction_id, position");
    builder
}

/// Streams events matching `query`, ordered by `(transaction_id, position)`,
/// starting strictly after `after` if given.
#[tracing::instrument(skip(pool, config, query), fields(after = ?after))]
pub fn stream<'a>(
    pool: &'a PgPool,
    config: &'a StoreConfig,
    query: &'a Query,
    after: Option<Cursor>,
) -> BoxStream<'a, Result<dcb_core::Event, Error>> {
    if let Err(err) = query.validate_for_read() {
        return Box::pin(futures::stream::once(async move {
            Err(Error::Core(dcb_core::Error::Validation(err)))
        }));
    }
    tracing::debug!("starting scan");

    let pool = pool.clone();
    let buffer = config.stream_buffer().max(1);
    let query = query.clone();
    let query_timeout = config.query_timeout();

    let (tx, mut rx) = mpsc::channel(buffer);

    tokio::spawn(async move {
        let statement = build_scan_statement(&query, after);
        let scan = async {
            let mut rows = statement.build().fetch(&pool);
            while let Some(row) = rows.next().await {
                let message = match row {
                    Ok(row) => Ok(row_to_event(&row)),
                    Err(err) => Err(Error::Database(err)),
                };
                if tx.send(message).await.is_err() {
                    // Receiver dropped: the caller stopped polling the stream.
                    return;
                }
            }
        };

        if tokio::time::timeout(query_timeout, scan).await.is_err() {
            tracing::debug!("scan timed out");
            let _ = tx
                .send(Err(Error::Core(dcb_core::Error::TimedOut)))
                .await;
        }
    });

    Box::pin(stream! {
        while let Some(item) = rx.recv().await {
            yield item;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use dcb_core::QueryItem;

    #[test]
    fn it_includes_the_commit_order_watermark() {
        let query = Query::build([QueryItem::new(["X"], []).unwrap()]);
        let builder = build_scan_statement(&query, None);
        assert!(builder.sql().contains("transaction_id < pg_snapshot_xmin(pg_current_snapshot())"));
        assert!(builder.sql().contains("ORDER BY transaction_id, position"));
    }

    #[test]
    fn it_rejects_an_empty_query_without_touching_the_pool() {
        let query = Query::build_empty();
        assert!(query.validate_for_read().is_err());
    }
}
