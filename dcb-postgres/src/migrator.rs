//! Schema bootstrap for `dcb-postgres`, grounded on
//! `disintegrate_postgres::migrator::Migrator` — a thin wrapper over a pool
//! whose job is to make the store's own tables/indexes exist, idempotently,
//! and nothing else. There is no versioned migration tooling here (that's a
//! non-goal); `init_event_store` is a bootstrap, run once up front.
//!
//! ## Why `transaction_id` is not a plain sequence
//!
//! A naive `event_id BIGSERIAL` assigns ids at insertion time, in the order
//! statements *start* writing, not the order they *commit* in. Two
//! concurrent transactions can interleave so that the one with the larger
//! id commits first; a reader that had already scanned up to that id would
//! then miss the earlier-numbered transaction's rows forever once it
//! finally commits — the "fast transaction laps slow transaction" anomaly
//! spec.md §9 calls out.
//!
//! This store instead stamps every row inserted by one transaction with
//! `pg_current_xact_id()`, Postgres's process-wide transaction id, which is
//! assigned once per transaction and is stable for all of that
//! transaction's writes. A reader additionally only considers rows whose
//! `transaction_id` is strictly below `pg_snapshot_xmin(pg_current_snapshot())`
//! — the oldest transaction id that was still in progress when the read's
//! snapshot was taken. Because MVCC guarantees every transaction below that
//! watermark has already either committed or aborted, a row at or above it
//! is never surfaced until it's guaranteed to never be "lapped" by an
//! earlier-numbered transaction still in flight. See `stream.rs`.
use sqlx::PgPool;

/// Errors raised while bootstrapping the schema.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

const SCHEMA_SQL: &str = include_str!("sql/schema.sql");

/// Bootstraps (idempotently) the tables, sequence, and indexes a
/// `PgEventStore` needs.
pub struct Migrator<'a> {
    pool: &'a PgPool,
}

impl<'a> Migrator<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Creates the `event` table, its supporting sequence, and its indexes
    /// if they do not already exist. Safe to call on every process start.
    pub async fn init_event_store(&self) -> Result<(), Error> {
        sqlx::raw_sql(SCHEMA_SQL).execute(self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[sqlx::test]
    async fn it_bootstraps_the_schema_idempotently(pool: PgPool) -> sqlx::Result<()> {
        let migrator = Migrator::new(&pool);
        migrator.init_event_store().await.unwrap();
        migrator.init_event_store().await.unwrap();

        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM information_schema.tables WHERE table_name = 'event')",
        )
        .fetch_one(&pool)
        .await?;
        assert!(exists);
        Ok(())
    }
}
