#![doc = include_str!("../README.md")]

mod append;
mod error;
mod insert;
mod migrator;
mod query_builder;
mod store;
mod stream;

pub use crate::error::Error;
pub use crate::migrator::{Error as MigrationError, Migrator};
pub use crate::store::PgEventStore;

/// Installs a `tracing-subscriber` formatting layer reading `RUST_LOG`
/// (defaulting to `info` when unset). Opt-in via the `tracing-init`
/// feature; libraries should not usually install a global subscriber on a
/// consumer's behalf, but this mirrors the convenience constructor the
/// sibling `grove-pg-stream` binaries use for their own `main`.
#[cfg(feature = "tracing-init")]
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).json().init();
}
