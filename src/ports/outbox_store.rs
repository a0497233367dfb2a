//! OutboxStore port - Durable queue of domain events awaiting publication.
//!
//! Rows are appended by repositories in the same transaction as the state
//! change they describe (see `JourneyRepository::save`). The relay is the only
//! component that mutates them afterwards.
//!
//! ## Row lifecycle
//!
//! 1. Written with `processed_at = NULL`
//! 2. Claimed by a relay for a short lease (`claimed_until`)
//! 3. Either marked processed after a confirmed publish, or annotated with
//!    an error and released so the next poll retries it
//! 4. Deleted by retention once processed long enough ago

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::time::Duration;

use crate::domain::foundation::{DomainError, DomainEvent, ErrorCode, EventId, Timestamp};
use crate::domain::outbox::OutboxEvent;

/// One row in an outbox table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxRecord {
    /// Equal to the id of the domain event stored in `payload`.
    pub id: EventId,

    /// Domain event tag, e.g. `journey.updated`.
    pub event_type: String,

    /// Serialized domain event.
    pub payload: JsonValue,

    /// Copied from the domain event.
    pub occurred_at: Timestamp,

    /// Set once a publish for this row has been confirmed.
    pub processed_at: Option<Timestamp>,

    /// Last decode or publish failure, if any.
    pub error: Option<String>,

    /// Publish attempts so far.
    pub attempts: u32,

    /// Lease held by the relay currently working on the row.
    pub claimed_until: Option<Timestamp>,
}

impl OutboxRecord {
    /// Builds an unprocessed row for `event`.
    pub fn from_event(event: &OutboxEvent) -> Result<Self, DomainError> {
        let payload = event.payload().map_err(|e| {
            DomainError::new(
                ErrorCode::InternalError,
                format!("Failed to serialize {}: {}", event.event_type(), e),
            )
        })?;

        Ok(Self {
            id: event.event_id(),
            event_type: event.event_type().to_string(),
            payload,
            occurred_at: event.occurred_at(),
            processed_at: None,
            error: None,
            attempts: 0,
            claimed_until: None,
        })
    }

    /// Builds rows for a batch of events, preserving order.
    pub fn from_events(events: &[OutboxEvent]) -> Result<Vec<Self>, DomainError> {
        events.iter().map(Self::from_event).collect()
    }

    /// True until a publish has been confirmed.
    pub fn is_pending(&self) -> bool {
        self.processed_at.is_none()
    }

    /// True if another relay holds a lease that has not expired at `now`.
    pub fn is_claimed_at(&self, now: Timestamp) -> bool {
        self.claimed_until.is_some_and(|until| until.is_after(&now))
    }

    /// Decodes the stored payload.
    pub fn decode(&self) -> Result<OutboxEvent, DomainError> {
        OutboxEvent::decode(&self.event_type, &self.payload).map_err(DomainError::from)
    }
}

/// Port for the relay side of a transactional outbox.
///
/// Several relays may share one table. `claim_unprocessed` must hand each
/// pending row to at most one caller while its lease is live.
#[async_trait]
pub trait OutboxStore: Send + Sync {
    /// Checks that the outbox table exists and is reachable.
    async fn schema_ready(&self) -> Result<(), DomainError>;

    /// Claims up to `limit` pending, unleased rows, oldest `occurred_at` first.
    ///
    /// Claimed rows get `claimed_until = now + lease` and their attempt
    /// counter incremented.
    async fn claim_unprocessed(
        &self,
        limit: u32,
        lease: Duration,
    ) -> Result<Vec<OutboxRecord>, DomainError>;

    /// Marks a row processed after a confirmed publish.
    async fn mark_processed(&self, id: &EventId, at: Timestamp) -> Result<(), DomainError>;

    /// Records a failure and releases the lease. `processed_at` is untouched.
    async fn record_error(&self, id: &EventId, error: &str) -> Result<(), DomainError>;

    /// Deletes rows processed before `before`. Returns how many were removed.
    async fn cleanup_processed(&self, before: Timestamp) -> Result<u64, DomainError>;
}
