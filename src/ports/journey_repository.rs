//! JourneyRepository port - Persistence for the journey aggregate.
//!
//! Every write takes the events produced by the mutation and appends them to
//! the journey outbox in the same transaction as the state change. If the
//! transaction fails, neither the state nor the rows are written.
//!
//! Writes are guarded by the journey version: a write built from a state
//! that is no longer the stored one is rejected, so each journey has a
//! single writer at a time.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, ErrorCode, JourneyId};
use crate::domain::journey::Journey;
use crate::domain::outbox::OutboxEvent;

#[async_trait]
pub trait JourneyRepository: Send + Sync {
    /// Persist a journey and append its events to the outbox.
    ///
    /// Version 1 is inserted. Any later version replaces the stored row only
    /// if that row is still at the previous version.
    ///
    /// # Errors
    ///
    /// - `ConcurrencyConflict` if the id is taken or the stored version moved on
    /// - `JourneyNotFound` if a later version has no stored row to replace
    async fn save(&self, journey: &Journey, events: &[OutboxEvent]) -> Result<(), DomainError>;

    /// Remove a journey and append its events to the outbox.
    ///
    /// The stored row must still be at `journey.version()`.
    ///
    /// # Errors
    ///
    /// - `ConcurrencyConflict` if the stored version moved on
    /// - `JourneyNotFound` if no such journey exists
    async fn delete(&self, journey: &Journey, events: &[OutboxEvent]) -> Result<(), DomainError>;

    /// Find a journey by its ID.
    async fn find_by_id(&self, id: &JourneyId) -> Result<Option<Journey>, DomainError>;
}

pub(crate) fn version_conflict(id: &JourneyId, expected: u32) -> DomainError {
    DomainError::new(
        ErrorCode::ConcurrencyConflict,
        "Journey version mismatch - another update occurred",
    )
    .with_detail("journey_id", id.to_string())
    .with_detail("expected_version", expected.to_string())
}

pub(crate) fn journey_not_found(id: &JourneyId) -> DomainError {
    DomainError::new(ErrorCode::JourneyNotFound, format!("Journey {} not found", id))
}
