//! Error taxonomy shared by every `EventStore` implementation.
//!
//! Validation errors are caught before any I/O and are never recovered
//! internally; concurrency, resource, projector, and cancellation errors all
//! trigger a rollback in whatever backend produced them and are surfaced to
//! the caller unchanged. The core performs no automatic retry.
use thiserror::Error;

use crate::condition::AppendCondition;

/// A single malformed-input failure caught before any I/O.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Errors common to every backend-independent operation the core exposes.
///
/// Backend crates (e.g. `dcb-postgres`) wrap this in their own error type,
/// adding backend-specific variants (`sqlx::Error`, migration failures, ...),
/// the same way `disintegrate-postgres::Error` wraps lower-level causes.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed input caught before any I/O: empty batch, batch too large,
    /// empty event type, empty/duplicate tag, invalid JSON payload, empty
    /// query item, projector with no transition, empty query for read/project.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// The append condition's predicate matched an event after the supplied
    /// cursor, or events exist after the cursor with no predicate at all.
    #[error("concurrency violation: condition {condition:?} was not satisfied")]
    ConcurrencyViolation { condition: AppendCondition },

    /// The storage engine was unavailable, a transaction could not begin,
    /// encoding failed, or the connection was lost.
    #[error("resource error in {subsystem}: {message}")]
    Resource {
        subsystem: &'static str,
        message: String,
    },

    /// A projector's transition function failed or produced a state of the
    /// wrong dynamic type.
    #[error("projector {projector_id} failed: {message}")]
    Projector {
        projector_id: String,
        message: String,
    },

    /// The caller's deadline elapsed, or cancellation was requested.
    #[error("operation timed out or was cancelled")]
    TimedOut,
}
