use thiserror::Error;

/// Represents all the ways a method can fail within `dcb-postgres`.
#[derive(Error, Debug)]
pub enum Error {
    /// A validation, concurrency, projector, or timeout error from the
    /// storage-agnostic core.
    #[error(transparent)]
    Core(#[from] dcb_core::Error),
    /// Error returned from the database driver.
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    /// Error returned while running the schema migrator.
    #[error(transparent)]
    Migration(#[from] crate::migrator::Error),
}
