//! An in-process `EventStore` fake for exercising the query model and
//! projection engine without a database.
//!
//! Grounded on the teacher's `DummyEventStore`/`MockDatabase` pattern in
//! `disintegrate::decision`'s tests: a minimal stand-in that satisfies the
//! trait so higher-level logic can be unit-tested fast and deterministically.
//! It is not a substitute for the `dcb-postgres` integration tests — it
//! shares no code with the real backend and doesn't attempt to reproduce
//! Postgres-specific behavior (isolation levels, error codes).
use std::sync::Mutex;

use async_trait::async_trait;
use futures::stream::{self, BoxStream};
use futures::StreamExt;

use crate::condition::AppendCondition;
use crate::cursor::Cursor;
use crate::error::{Error as CoreError, ValidationError};
use crate::event::{Event, InputEvent};
use crate::query::Query;
use crate::store::EventStore;

/// An in-memory, single-process event store. Not durable, not safe to
/// share across real concurrent writers beyond what `std::sync::Mutex`
/// gives you — intended for tests only.
#[derive(Default)]
pub struct MemoryEventStore {
    events: Mutex<Vec<Event>>,
    next_transaction_id: Mutex<u64>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            next_transaction_id: Mutex::new(1),
        }
    }

    /// Appends `inputs` to an already-locked `events` vector. Callers that
    /// also need to check a condition must take the `events` lock *before*
    /// checking and hold it through this call, or a writer could slip a
    /// conflicting append in between the check and the insert.
    fn insert_locked(events: &mut Vec<Event>, next_tx: &mut u64, inputs: Vec<InputEvent>) -> Vec<Event> {
        let transaction_id = *next_tx;
        *next_tx += 1;

        let mut position = events.last().map(|e| e.position()).unwrap_or(0);
        let mut persisted = Vec::with_capacity(inputs.len());
        for input in inputs {
            position += 1;
            let event = Event::from_input(input, transaction_id, position, chrono::Utc::now());
            events.push(event.clone());
            persisted.push(event);
        }
        persisted
    }

    fn insert_batch(&self, inputs: Vec<InputEvent>) -> Vec<Event> {
        let mut events = self.events.lock().unwrap();
        let mut next_tx = self.next_transaction_id.lock().unwrap();
        Self::insert_locked(&mut events, &mut next_tx, inputs)
    }

    fn validate_batch(inputs: &[InputEvent]) -> Result<(), ValidationError> {
        if inputs.is_empty() {
            return Err(ValidationError::new("events", "batch must not be empty"));
        }
        Ok(())
    }
}

#[async_trait]
impl EventStore for MemoryEventStore {
    type Error = CoreError;

    fn stream<'a>(
        &'a self,
        query: &'a Query,
        after: Option<Cursor>,
    ) -> BoxStream<'a, Result<Event, Self::Error>> {
        if query.validate_for_read().is_err() {
            return stream::once(async {
                Err(CoreError::Validation(ValidationError::new(
                    "query",
                    "a query used for read or projection must have at least one item",
                )))
            })
            .boxed();
        }
        let after = after.unwrap_or_else(Cursor::zero);
        let snapshot: Vec<Event> = self
            .events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.cursor() > after && query.matches(e.event_type(), e.tags()))
            .cloned()
            .collect();
        stream::iter(snapshot.into_iter().map(Ok)).boxed()
    }

    async fn append(&self, events: Vec<InputEvent>) -> Result<Vec<Event>, Self::Error> {
        Self::validate_batch(&events)?;
        Ok(self.insert_batch(events))
    }

    async fn append_if(
        &self,
        events: Vec<InputEvent>,
        condition: AppendCondition,
    ) -> Result<Vec<Event>, Self::Error> {
        Self::validate_batch(&events)?;

        // The conflict check and the insert happen under the same `events`
        // lock: if it were released between them, a second concurrent
        // caller could append a conflicting event in the gap and both
        // `append_if` calls would observe "no conflict" and succeed.
        let mut stored = self.events.lock().unwrap();
        let after = condition.after_cursor().unwrap_or_else(Cursor::zero);
        let conflict = stored.iter().any(|e| {
            e.cursor() > after
                && condition
                    .fail_if_events_match()
                    .map(|q| q.matches(e.event_type(), e.tags()))
                    .unwrap_or(true)
        });

        if conflict {
            return Err(CoreError::ConcurrencyViolation { condition });
        }

        let mut next_tx = self.next_transaction_id.lock().unwrap();
        Ok(Self::insert_locked(&mut stored, &mut next_tx, events))
    }
}
