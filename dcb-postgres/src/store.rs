//! `PgEventStore`: the `dcb_core::EventStore` implementation backed by a
//! Postgres connection pool.
//!
//! Grounded on `disintegrate_postgres::event_store::PgEventStore`'s shape
//! (a pool plus configuration, with `EventStore` delegating to free
//! functions that build and run the actual SQL) but without a serializer
//! type parameter — this store's `InputEvent`/`Event` already carry a plain
//! `serde_json::Value` payload, so there is no pluggable codec layer to
//! thread through (payload encoding is out of scope; see SPEC_FULL.md §0).
use async_trait::async_trait;
use dcb_core::{AppendCondition, Cursor, Event, EventStore, InputEvent, Query, StoreConfig};
use futures::stream::BoxStream;
use sqlx::PgPool;

use crate::append;
use crate::error::Error;
use crate::migrator::Migrator;
use crate::stream;

/// A Postgres-backed [`EventStore`].
///
/// Cloning is cheap: `PgPool` is a handle around a connection pool shared
/// behind an `Arc`.
#[derive(Debug, Clone)]
pub struct PgEventStore {
    pool: PgPool,
    config: StoreConfig,
}

impl PgEventStore {
    /// Wraps an existing pool with the default [`StoreConfig`].
    pub fn new(pool: PgPool) -> Self {
        Self::with_config(pool, StoreConfig::default())
    }

    /// Wraps an existing pool with an explicit configuration.
    pub fn with_config(pool: PgPool, config: StoreConfig) -> Self {
        Self { pool, config }
    }

    /// Bootstraps the schema this store needs. Equivalent to constructing a
    /// [`Migrator`] over the same pool and calling
    /// [`Migrator::init_event_store`]; provided here for convenience since
    /// most callers only ever migrate the store they're about to use.
    pub async fn migrate(&self) -> Result<(), Error> {
        Migrator::new(&self.pool)
            .init_event_store()
            .await
            .map_err(Error::Migration)
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }
}

#[async_trait]
impl EventStore for PgEventStore {
    type Error = Error;

    fn stream<'a>(
        &'a self,
        query: &'a Query,
        after: Option<Cursor>,
    ) -> BoxStream<'a, Result<Event, Self::Error>> {
        stream::stream(&self.pool, &self.config, query, after)
    }

    async fn append(&self, events: Vec<InputEvent>) -> Result<Vec<Event>, Self::Error> {
        append::append(&self.pool, &self.config, events).await
    }

    async fn append_if(
        &self,
        events: Vec<InputEvent>,
        condition: AppendCondition,
    ) -> Result<Vec<Event>, Self::Error> {
        append::append_if(&self.pool, &self.config, events, condition).await
    }
}
