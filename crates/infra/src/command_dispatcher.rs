//! Command execution pipeline.
//!
//! ```text
//! Command
//!   ↓
//! 1. Load the aggregate's stream
//!   ↓
//! 2. Rehydrate (apply history in sequence order)
//!   ↓
//! 3. Handle (pure decision, produces events or a DomainError)
//!   ↓
//! 4. Append with ExpectedVersion::Exact(loaded version)
//!   ↓
//! 5. Publish each committed event on the bus
//! ```
//!
//! Step 4 is the per-aggregate transaction: a rejected command appends nothing, and a
//! concurrent writer on the same aggregate loses with `DispatchError::Concurrency`.
//! Step 5 runs only after step 4 succeeded, so subscribers never see an event for a
//! change that was not committed.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::{debug, error};
use uuid::Uuid;

use larder_core::{Aggregate, AggregateId, DomainError, ExpectedVersion};
use larder_events::{EventBus, EventEnvelope};

use crate::event_store::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};
use crate::material_store::MaterialStoreError;

#[derive(Debug, Error)]
pub enum DispatchError {
    /// Deterministic rejection by the aggregate or the service in front of it.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Optimistic concurrency failure (stale aggregate version).
    #[error("concurrent modification: {0}")]
    Concurrency(String),

    /// A stored payload could not be read back as the aggregate's event type.
    #[error("failed to deserialize stored event: {0}")]
    Deserialize(String),

    #[error("event store failure: {0}")]
    Store(EventStoreError),

    /// Material lookups made while preparing a command failed.
    #[error("material store failure: {0}")]
    Materials(#[from] MaterialStoreError),

    /// Publication failed after a successful append. The events are committed;
    /// `redeliver` republishes them.
    #[error("event publication failed: {0}")]
    Publish(String),
}

impl From<EventStoreError> for DispatchError {
    fn from(value: EventStoreError) -> Self {
        match value {
            EventStoreError::Concurrency(msg) => DispatchError::Concurrency(msg),
            other => DispatchError::Store(other),
        }
    }
}

impl DispatchError {
    /// The domain error behind this failure, if it was a domain rejection.
    pub fn as_domain(&self) -> Option<&DomainError> {
        match self {
            DispatchError::Domain(e) => Some(e),
            _ => None,
        }
    }
}

/// Outcome of a successful dispatch: the aggregate after the command, and the
/// events that were committed for it.
#[derive(Debug, Clone)]
pub struct Committed<A> {
    pub aggregate: A,
    pub events: Vec<StoredEvent>,
}

/// Reusable command execution engine for event-sourced aggregates.
///
/// Generic over the store and the bus so tests and services share one code path.
#[derive(Debug)]
pub struct CommandDispatcher<S, B> {
    store: S,
    bus: B,
}

impl<S, B> CommandDispatcher<S, B> {
    pub fn new(store: S, bus: B) -> Self {
        Self { store, bus }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }
}

impl<S, B> CommandDispatcher<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Run `command` against the aggregate stored under `aggregate_id`.
    ///
    /// `make_aggregate` builds the empty instance history is applied to (for example
    /// `Purchase::empty`). On success the returned aggregate already reflects the
    /// committed events.
    pub fn dispatch<A>(
        &self,
        aggregate_id: AggregateId,
        aggregate_type: &str,
        command: A::Command,
        make_aggregate: impl FnOnce(AggregateId) -> A,
    ) -> Result<Committed<A>, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: larder_events::Event + Serialize + DeserializeOwned,
    {
        let history = self.store.load_stream(aggregate_id)?;
        validate_loaded_stream(aggregate_id, &history)?;
        let expected = ExpectedVersion::Exact(stream_version(&history));

        let mut aggregate = make_aggregate(aggregate_id);
        apply_history::<A>(&mut aggregate, &history)?;

        let decided = aggregate.handle(&command)?;
        if decided.is_empty() {
            return Ok(Committed {
                aggregate,
                events: vec![],
            });
        }

        let uncommitted = decided
            .iter()
            .map(|ev| UncommittedEvent::from_typed(aggregate_id, aggregate_type, Uuid::now_v7(), ev))
            .collect::<Result<Vec<_>, _>>()?;

        let committed = self.store.append(uncommitted, expected)?;
        for ev in &decided {
            aggregate.apply(ev);
        }
        debug!(
            %aggregate_id,
            aggregate_type,
            events = committed.len(),
            version = stream_version(&committed),
            "events committed"
        );

        self.publish_all(&committed)?;

        Ok(Committed {
            aggregate,
            events: committed,
        })
    }

    /// Rehydrate an aggregate without running a command.
    pub fn load<A>(
        &self,
        aggregate_id: AggregateId,
        make_aggregate: impl FnOnce(AggregateId) -> A,
    ) -> Result<A, DispatchError>
    where
        A: Aggregate,
        A::Event: DeserializeOwned,
    {
        let history = self.store.load_stream(aggregate_id)?;
        validate_loaded_stream(aggregate_id, &history)?;
        let mut aggregate = make_aggregate(aggregate_id);
        apply_history::<A>(&mut aggregate, &history)?;
        Ok(aggregate)
    }

    /// Publish every stored event of a stream again.
    ///
    /// Stands in for an upstream outbox retry: consumers see the same envelopes
    /// (same event ids and sequence numbers) a second time.
    pub fn redeliver(&self, aggregate_id: AggregateId) -> Result<usize, DispatchError> {
        let history = self.store.load_stream(aggregate_id)?;
        validate_loaded_stream(aggregate_id, &history)?;
        self.publish_all(&history)?;
        debug!(%aggregate_id, events = history.len(), "stream redelivered");
        Ok(history.len())
    }

    fn publish_all(&self, events: &[StoredEvent]) -> Result<(), DispatchError> {
        for stored in events {
            if let Err(err) = self.bus.publish(stored.to_envelope()) {
                error!(
                    aggregate_id = %stored.aggregate_id,
                    sequence_number = stored.sequence_number,
                    event_type = %stored.event_type,
                    error = ?err,
                    "publishing committed event failed"
                );
                return Err(DispatchError::Publish(format!("{err:?}")));
            }
        }
        Ok(())
    }
}

fn stream_version(stream: &[StoredEvent]) -> u64 {
    stream.last().map(|e| e.sequence_number).unwrap_or(0)
}

fn validate_loaded_stream(aggregate_id: AggregateId, stream: &[StoredEvent]) -> Result<(), DispatchError> {
    let mut last = 0u64;
    for (idx, e) in stream.iter().enumerate() {
        if e.aggregate_id != aggregate_id {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(format!(
                "loaded stream contains wrong aggregate_id at index {idx}"
            ))));
        }
        if e.sequence_number <= last {
            return Err(DispatchError::Store(EventStoreError::InvalidAppend(format!(
                "non-monotonic sequence_number in loaded stream (last={last}, found={})",
                e.sequence_number
            ))));
        }
        last = e.sequence_number;
    }
    Ok(())
}

fn apply_history<A>(aggregate: &mut A, history: &[StoredEvent]) -> Result<(), DispatchError>
where
    A: Aggregate,
    A::Event: DeserializeOwned,
{
    for stored in history {
        let ev: A::Event = serde_json::from_value(stored.payload.clone())
            .map_err(|e| DispatchError::Deserialize(format!("{} #{}: {e}", stored.event_type, stored.sequence_number)))?;
        aggregate.apply(&ev);
    }
    Ok(())
}
