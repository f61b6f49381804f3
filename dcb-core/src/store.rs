//! The `EventStore` trait: the contract every backend (currently only
//! `dcb-postgres`) must satisfy.
//!
//! This trait captures the append pipeline and the read/stream pipeline of
//! spec.md §4.2-4.3. It says nothing about SQL, connection pools, or
//! transactions — those are a backend's concern.
use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::condition::AppendCondition;
use crate::cursor::Cursor;
use crate::event::{Event, InputEvent};
use crate::query::Query;

/// A store capable of appending and streaming events under the DCB
/// contract.
///
/// Implementations must uphold I1-I6 from spec.md §3: global ordering by
/// `(transaction_id, position)`, atomic batch visibility, and — the crux of
/// the whole design — that the predicate check of `append_if` and the
/// insertion of the batch happen under one transaction so no event can be
/// written between the check and the insert.
#[async_trait]
pub trait EventStore: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Streams events matching `query`, ordered by `(transaction_id,
    /// position)` ascending, starting strictly after `after` if given.
    ///
    /// `query` must have at least one item; an implementation should reject
    /// an empty query with a `Validation` error rather than silently
    /// returning nothing.
    fn stream<'a>(
        &'a self,
        query: &'a Query,
        after: Option<Cursor>,
    ) -> BoxStream<'a, Result<Event, Self::Error>>;

    /// Appends `events` unconditionally. Fails only for validation reasons
    /// (empty batch, batch too large, malformed event) — never due to
    /// concurrent writers.
    async fn append(&self, events: Vec<InputEvent>) -> Result<Vec<Event>, Self::Error>;

    /// Appends `events` only if `condition` is not violated by anything
    /// committed since the condition's cursor. See [`AppendCondition`] for
    /// the exact semantics of each combination of predicate and cursor.
    async fn append_if(
        &self,
        events: Vec<InputEvent>,
        condition: AppendCondition,
    ) -> Result<Vec<Event>, Self::Error>;
}
