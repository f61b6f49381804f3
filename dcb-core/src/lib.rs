#![doc = include_str!("../README.md")]

mod condition;
mod config;
mod cursor;
mod error;
mod event;
mod projection;
mod projector;
mod query;
mod store;
mod tag;
pub mod testing;

#[doc(inline)]
pub use crate::condition::AppendCondition;
#[doc(inline)]
pub use crate::config::StoreConfig;
#[doc(inline)]
pub use crate::cursor::Cursor;
#[doc(inline)]
pub use crate::error::{Error, ValidationError};
#[doc(inline)]
pub use crate::event::{Event, InputEvent};
#[doc(inline)]
pub use crate::projection::{Error as ProjectionError, ProjectionEngine, ProjectionResult};
#[doc(inline)]
pub use crate::projector::{ErasedProjector, StateProjector};
#[doc(inline)]
pub use crate::query::{Query, QueryItem};
#[doc(inline)]
pub use crate::store::EventStore;
#[doc(inline)]
pub use crate::tag::Tag;
