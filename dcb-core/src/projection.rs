//! The projection engine: fans one scan out to N [`StateProjector`]s and
//! hands back both their final states and an [`AppendCondition`] that
//! guarantees nothing relevant to any of them changed since (spec.md §4.4).
//!
//! This mirrors the shape of the teacher's `DecisionMaker` (a small wrapper
//! holding a generic event store, exposing one `async fn`), generalized
//! from folding a single typed state to fanning out to a runtime-sized set
//! of type-erased projectors sharing one combined-query scan.
use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};

use futures::TryStreamExt;
use thiserror::Error;
use tokio::sync::oneshot;

use crate::condition::AppendCondition;
use crate::cursor::Cursor;
use crate::error::ValidationError;
use crate::projector::ErasedProjector;
use crate::query::Query;
use crate::store::EventStore;

/// Errors the projection engine itself can raise, layered on top of
/// whatever the underlying store reports.
#[derive(Error, Debug)]
pub enum Error<SE> {
    #[error(transparent)]
    Store(SE),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("projector {projector_id} failed: {message}")]
    Projector { projector_id: String, message: String },
}

/// The outcome of [`ProjectionEngine::project`]: each projector's final
/// state, plus the append condition asserting nothing relevant changed.
pub struct ProjectionResult {
    states: HashMap<String, Box<dyn Any + Send + Sync>>,
    condition: AppendCondition,
}

impl ProjectionResult {
    /// Retrieves the final state of the projector registered under `id`,
    /// downcast to `S`. Returns `None` if no projector with that id was
    /// part of the projection, or if `S` doesn't match the type it was
    /// registered with.
    pub fn state<S: 'static>(&self, id: &str) -> Option<&S> {
        self.states.get(id).and_then(|s| s.downcast_ref::<S>())
    }

    /// The append condition derived from this projection's scan position.
    /// Passing it unchanged to `EventStore::append_if` performs the DCB
    /// consistency check in one round-trip.
    pub fn condition(&self) -> &AppendCondition {
        &self.condition
    }
}

/// Executes decision-model projections against a backing `EventStore`.
pub struct ProjectionEngine<ES> {
    store: ES,
}

impl<ES> ProjectionEngine<ES>
where
    ES: EventStore,
{
    pub fn new(store: ES) -> Self {
        Self { store }
    }

    /// Projects `projectors` in a single scan, starting strictly after
    /// `after` if given.
    ///
    /// Running N projectors as N separate scans would each observe a
    /// different (potentially inconsistent) snapshot, breaking the
    /// guarantee backing the returned `AppendCondition` — so this always
    /// performs exactly one scan over the union of every projector's query,
    /// fanning each event out only to the projectors whose own query
    /// matches it (spec.md §9, "Projection as a single scan").
    #[tracing::instrument(skip(self, projectors), fields(projector_count = projectors.len()))]
    pub async fn project(
        &self,
        projectors: Vec<Box<dyn ErasedProjector>>,
        after: Option<Cursor>,
    ) -> Result<ProjectionResult, Error<ES::Error>> {
        if projectors.is_empty() {
            return Err(ValidationError::new(
                "projectors",
                "at least one projector is required",
            )
            .into());
        }
        for projector in &projectors {
            projector
                .query()
                .validate_for_read()
                .map_err(|e| Error::Validation(e))?;
        }

        let combined_query = Query::union(projectors.iter().map(|p| p.query().clone()));

        let mut states: HashMap<String, Box<dyn Any + Send + Sync>> = projectors
            .iter()
            .map(|p| (p.id().to_string(), p.initial_state()))
            .collect();

        let mut tail = after.unwrap_or_else(Cursor::zero);
        let mut scan = self.store.stream(&combined_query, after);
        while let Some(event) = scan.try_next().await.map_err(Error::Store)? {
            tail = event.cursor();
            for projector in &projectors {
                if projector.query().matches(event.event_type(), event.tags()) {
                    let current = states.remove(projector.id()).expect("projector registered above");
                    let next = apply_guarded(projector.as_ref(), current, &event)?;
                    states.insert(projector.id().to_string(), next);
                }
            }
        }

        let condition = AppendCondition::fail_if_matches_after(combined_query, tail);
        tracing::debug!(tail = ?tail, "projection scan complete");
        Ok(ProjectionResult { states, condition })
    }

    /// Like [`Self::project`], but hands the single result back through a
    /// oneshot channel instead of directly — spec.md §4.4's `projectStream`.
    /// Still exactly one scan, exactly one outcome; the channel closes the
    /// instant that outcome is sent.
    pub async fn project_stream(
        &self,
        projectors: Vec<Box<dyn ErasedProjector>>,
        after: Option<Cursor>,
    ) -> oneshot::Receiver<Result<ProjectionResult, Error<ES::Error>>> {
        let (tx, rx) = oneshot::channel();
        let result = self.project(projectors, after).await;
        let _ = tx.send(result);
        rx
    }
}

/// Runs one projector's `apply`, converting a caught panic or a failed
/// downcast into a `Projector` error rather than unwinding the scan loop.
fn apply_guarded<SE>(
    projector: &dyn ErasedProjector,
    state: Box<dyn Any + Send + Sync>,
    event: &crate::event::Event,
) -> Result<Box<dyn Any + Send + Sync>, Error<SE>> {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| projector.apply(state, event)));
    match outcome {
        Ok(Ok(next)) => Ok(next),
        Ok(Err(message)) => Err(Error::Projector {
            projector_id: projector.id().to_string(),
            message,
        }),
        Err(panic) => Err(Error::Projector {
            projector_id: projector.id().to_string(),
            message: panic_message(panic.as_ref()),
        }),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "projector transition panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projector::StateProjector;
    use crate::query::QueryItem;
    use crate::tag::Tag;
    use crate::testing::MemoryEventStore;
    use crate::event::InputEvent;
    use serde_json::json;

    fn tag(k: &str, v: &str) -> Tag {
        Tag::new(k, v).unwrap()
    }

    #[tokio::test]
    async fn it_folds_each_event_into_only_the_projectors_it_matches() {
        let store = MemoryEventStore::new();
        store
            .append(vec![
                InputEvent::new("CourseDefined", [tag("course_id", "c1")], json!({"cap": 2})).unwrap(),
                InputEvent::new(
                    "StudentEnrolled",
                    [tag("course_id", "c1"), tag("student_id", "s1")],
                    json!({}),
                )
                .unwrap(),
                InputEvent::new(
                    "StudentEnrolled",
                    [tag("course_id", "c1"), tag("student_id", "s2")],
                    json!({}),
                )
                .unwrap(),
            ])
            .await
            .unwrap();

        let capacity = StateProjector::new(
            "capacity",
            Query::build([QueryItem::new(["CourseDefined"], [tag("course_id", "c1")]).unwrap()]),
            0i64,
            |_state, event| event.data()["cap"].as_i64().unwrap_or_default(),
        );
        let enrolled = StateProjector::new(
            "enrolled",
            Query::build([QueryItem::new(["StudentEnrolled"], [tag("course_id", "c1")]).unwrap()]),
            0i64,
            |state, _event| state + 1,
        );

        let engine = ProjectionEngine::new(store);
        let result = engine
            .project(
                vec![Box::new(capacity), Box::new(enrolled)],
                None,
            )
            .await
            .unwrap();

        assert_eq!(result.state::<i64>("capacity"), Some(&2));
        assert_eq!(result.state::<i64>("enrolled"), Some(&2));
        assert!(!result.condition().is_unconditional());
    }

    #[tokio::test]
    async fn empty_scan_still_yields_a_valid_condition() {
        let store = MemoryEventStore::new();
        let projector = StateProjector::new(
            "exists",
            Query::build([QueryItem::new(["CourseDefined"], [tag("course_id", "c1")]).unwrap()]),
            false,
            |_s, _e| true,
        );
        let engine = ProjectionEngine::new(store);
        let result = engine.project(vec![Box::new(projector)], None).await.unwrap();
        assert_eq!(result.state::<bool>("exists"), Some(&false));
        assert_eq!(result.condition().after_cursor(), Some(Cursor::zero()));
    }

    #[tokio::test]
    async fn projecting_with_no_projectors_is_a_validation_error() {
        let store = MemoryEventStore::new();
        let engine = ProjectionEngine::new(store);
        let result = engine.project(vec![], None).await;
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[tokio::test]
    async fn a_panicking_transition_fails_the_whole_projection_with_no_partial_state() {
        let store = MemoryEventStore::new();
        store
            .append(vec![InputEvent::new("CourseDefined", [tag("course_id", "c1")], json!({})).unwrap()])
            .await
            .unwrap();

        let exploding = StateProjector::new(
            "exploding",
            Query::build([QueryItem::new(["CourseDefined"], [tag("course_id", "c1")]).unwrap()]),
            0i64,
            |_state, _event| panic!("boom"),
        );

        let engine = ProjectionEngine::new(store);
        let result = engine.project(vec![Box::new(exploding)], None).await;

        assert!(matches!(
            result,
            Err(Error::Projector { projector_id, .. }) if projector_id == "exploding"
        ));
    }

    #[tokio::test]
    async fn project_stream_emits_exactly_one_outcome_then_closes() {
        let store = MemoryEventStore::new();
        let projector = StateProjector::new(
            "exists",
            Query::build([QueryItem::new(["CourseDefined"], [tag("course_id", "c1")]).unwrap()]),
            false,
            |_s, _e| true,
        );
        let engine = ProjectionEngine::new(store);
        let mut rx = engine.project_stream(vec![Box::new(projector)], None).await;
        let result = rx.try_recv().expect("a single outcome is already available");
        assert!(result.is_ok());
        assert!(matches!(rx.try_recv(), Err(tokio::sync::oneshot::error::TryRecvError::Closed)));
    }
}
