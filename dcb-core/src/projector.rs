//! State projectors: pure reducers `(state, event) -> state` paired with a
//! query and an initial state (spec.md §3, `StateProjector`).
//!
//! A decision model is one or more projectors folded over a single scan
//! (see [`crate::projection`]). Because the engine must hand back a
//! runtime-sized `id -> state` map whose value types differ per projector,
//! each projector's state is type-erased behind `Box<dyn Any + Send +
//! Sync>` once it enters the engine — the same type-map idiom used for
//! per-request extension maps elsewhere in the Rust ecosystem (e.g.
//! `http::Extensions`). `StateProjector<S>` itself stays fully typed; the
//! erasure only happens at the [`ErasedProjector`] seam.
use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::event::Event;
use crate::query::Query;

/// A typed projector: folds `transition` over every event matching `query`,
/// starting from `initial`.
pub struct StateProjector<S> {
    id: String,
    query: Query,
    initial: S,
    transition: Arc<dyn Fn(&S, &Event) -> S + Send + Sync>,
}

impl<S> StateProjector<S> {
    /// Creates a new projector. `transition` must be a pure function of its
    /// two arguments: the engine may call it from any event in the scan,
    /// in order, but never concurrently for the same projector.
    pub fn new(
        id: impl Into<String>,
        query: Query,
        initial: S,
        transition: impl Fn(&S, &Event) -> S + Send + Sync + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            query,
            initial,
            transition: Arc::new(transition),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn query(&self) -> &Query {
        &self.query
    }
}

impl<S> fmt::Debug for StateProjector<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateProjector").field("id", &self.id).finish_non_exhaustive()
    }
}

/// The type-erased form of a [`StateProjector`] the projection engine fans
/// events out to. You will not normally implement this yourself; it is
/// implemented for every `StateProjector<S>` with `S: Clone + Send + Sync +
/// 'static`.
pub trait ErasedProjector: Send + Sync {
    fn id(&self) -> &str;
    fn query(&self) -> &Query;
    fn initial_state(&self) -> Box<dyn Any + Send + Sync>;

    /// Applies one event to `state`. Returns `Err` (rather than panicking)
    /// if `state` was not produced by this projector's own `initial_state`/
    /// `apply` — the caller decides how to report that as a projector
    /// failure instead of unwinding the whole scan.
    fn apply(
        &self,
        state: Box<dyn Any + Send + Sync>,
        event: &Event,
    ) -> Result<Box<dyn Any + Send + Sync>, String>;
}

impl<S> ErasedProjector for StateProjector<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn id(&self) -> &str {
        &self.id
    }

    fn query(&self) -> &Query {
        &self.query
    }

    fn initial_state(&self) -> Box<dyn Any + Send + Sync> {
        Box::new(self.initial.clone())
    }

    fn apply(
        &self,
        state: Box<dyn Any + Send + Sync>,
        event: &Event,
    ) -> Result<Box<dyn Any + Send + Sync>, String> {
        let state = state
            .downcast::<S>()
            .map_err(|_| "projector state type changed between scan steps".to_string())?;
        Ok(Box::new((self.transition)(&state, event)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::QueryItem;
    use serde_json::json;

    fn event(ty: &str) -> Event {
        let input = crate::event::InputEvent::new(ty, [], json!({})).unwrap();
        Event::from_input(input, 1, 1, chrono::Utc::now())
    }

    #[test]
    fn erased_projector_roundtrips_typed_state() {
        let projector = StateProjector::new(
            "count",
            Query::build([QueryItem::new(["X"], []).unwrap()]),
            0u32,
            |state, _event| state + 1,
        );
        let erased: Box<dyn ErasedProjector> = Box::new(projector);
        let state = erased.initial_state();
        let state = erased.apply(state, &event("X")).unwrap();
        let state = erased.apply(state, &event("X")).unwrap();
        assert_eq!(*state.downcast::<u32>().unwrap(), 2);
    }

    #[test]
    fn apply_reports_a_type_mismatch_instead_of_panicking() {
        let projector = StateProjector::new(
            "count",
            Query::build([QueryItem::new(["X"], []).unwrap()]),
            0u32,
            |state, _event| state + 1,
        );
        let erased: Box<dyn ErasedProjector> = Box::new(projector);
        let wrong_type: Box<dyn Any + Send + Sync> = Box::new("not a u32".to_string());
        assert!(erased.apply(wrong_type, &event("X")).is_err());
    }
}
