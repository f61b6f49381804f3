//! The append pipeline: validation, the atomic insert of `insert.rs`, the
//! `SERIALIZABLE` transaction that makes a guarded append's "exactly one
//! writer wins" hold across sessions, and the deadline the caller or
//! `StoreConfig::append_timeout` imposes on the whole thing.
//!
//! Grounded on `disintegrate_postgres::event_store::PgEventStore::append`,
//! which runs its check-and-insert under `SET TRANSACTION ISOLATION LEVEL
//! SERIALIZABLE` and maps a `40001` (serialization_failure) commit error to
//! its concurrency error. This crate folds the check and the insert into
//! `insert.rs`'s single statement, but the cross-session guarantee still
//! comes from `SERIALIZABLE`, not from the statement count — the
//! conflict CTE's `SELECT` is what gives Postgres's serializable snapshot
//! isolation something to invalidate when another session's commit lands
//! first.
use dcb_core::{AppendCondition, Error as CoreError, Event, InputEvent, StoreConfig, ValidationError};
use sqlx::PgPool;

use crate::error::Error;
use crate::insert;

const SET_SERIALIZABLE: &str = "SET TRANSACTION ISOLATION LEVEL SERIALIZABLE";

fn validate_batch(events: &[InputEvent], config: &StoreConfig) -> Result<(), CoreError> {
    if events.is_empty() {
        return Err(CoreError::Validation(ValidationError::new(
            "events",
            "append requires at least one event",
        )));
    }
    if events.len() > config.max_batch_size() {
        return Err(CoreError::Validation(ValidationError::new(
            "events",
            format!(
                "batch of {} events exceeds the configured maximum of {}",
                events.len(),
                config.max_batch_size()
            ),
        )));
    }
    Ok(())
}

/// Appends `events` unconditionally.
#[tracing::instrument(skip(pool, config, events), fields(batch_size = events.len()))]
pub async fn append(
    pool: &PgPool,
    config: &StoreConfig,
    events: Vec<InputEvent>,
) -> Result<Vec<Event>, Error> {
    validate_batch(&events, config)?;
    let persisted = tokio::time::timeout(config.append_timeout(), insert::insert_batch(pool, &events, None))
        .await
        .map_err(|_| Error::Core(CoreError::TimedOut))?
        .map_err(Error::Database)?;
    tracing::debug!(persisted = persisted.len(), "appended events");
    Ok(persisted)
}

/// Appends `events` only if `condition` is not violated by anything another
/// session commits concurrently.
#[tracing::instrument(skip(pool, config, events, condition), fields(batch_size = events.len()))]
pub async fn append_if(
    pool: &PgPool,
    config: &StoreConfig,
    events: Vec<InputEvent>,
    condition: AppendCondition,
) -> Result<Vec<Event>, Error> {
    validate_batch(&events, config)?;

    let persisted = tokio::time::timeout(
        config.append_timeout(),
        append_if_guarded(pool, &events, &condition),
    )
    .await
    .map_err(|_| Error::Core(CoreError::TimedOut))??;

    tracing::debug!(persisted = persisted.len(), "appended events");
    Ok(persisted)
}

/// Runs the guarded insert. Unconditional conditions skip the transaction
/// entirely, since there is nothing to protect against a concurrent writer.
/// Guarded conditions run inside a `SERIALIZABLE` transaction: the conflict
/// check's `SELECT` becomes part of that transaction's read set, so Postgres
/// detects (at commit time) whether another session's commit would have
/// changed its answer, and aborts one of the two transactions with `40001`.
async fn append_if_guarded(
    pool: &PgPool,
    events: &[InputEvent],
    condition: &AppendCondition,
) -> Result<Vec<Event>, Error> {
    if condition.is_unconditional() {
        return insert::insert_batch(pool, events, Some(condition))
            .await
            .map_err(Error::Database);
    }

    let mut tx = pool.begin().await?;
    sqlx::query(SET_SERIALIZABLE).execute(&mut *tx).await?;

    let persisted = insert::insert_batch(&mut *tx, events, Some(condition)).await?;
    if persisted.is_empty() {
        tracing::debug!(?condition, "append blocked by concurrency condition");
        return Err(Error::Core(CoreError::ConcurrencyViolation {
            condition: condition.clone(),
        }));
    }

    tx.commit()
        .await
        .map_err(|err| map_serialization_failure(err, condition))?;

    Ok(persisted)
}

/// Maps a `40001` (serialization_failure) commit error — the write-skew
/// Postgres's `SERIALIZABLE` isolation detected between this transaction and
/// a concurrent one — to the same `ConcurrencyViolation` an in-snapshot
/// conflict produces. Any other database error passes through unchanged.
fn map_serialization_failure(err: sqlx::Error, condition: &AppendCondition) -> Error {
    if let sqlx::Error::Database(ref description) = err {
        if description.code().as_deref() == Some("40001") {
            return Error::Core(CoreError::ConcurrencyViolation {
                condition: condition.clone(),
            });
        }
    }
    Error::Database(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dcb_core::Tag;
    use serde_json::json;

    fn event(event_type: &str, tags: Vec<Tag>) -> InputEvent {
        InputEvent::new(event_type, tags, json!({})).unwrap()
    }

    #[test]
    fn it_rejects_an_empty_batch_before_touching_the_pool() {
        let config = StoreConfig::default();
        let err = validate_batch(&[], &config).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn it_rejects_a_batch_larger_than_the_configured_maximum() {
        let config = StoreConfig::default().with_max_batch_size(1);
        let events = vec![event("A", vec![]), event("B", vec![])];
        let err = validate_batch(&events, &config).unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }
}
