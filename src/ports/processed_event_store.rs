//! ProcessedEventStore port - Ledger of (event, handler) pairs already handled.
//!
//! Backs `IdempotentHandler`. A pair is recorded only after the inner handler
//! succeeded, so a failed attempt is retried on redelivery.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, EventId, Timestamp};

#[async_trait]
pub trait ProcessedEventStore: Send + Sync {
    /// True if `handler_name` already processed `event_id`.
    async fn contains(&self, event_id: &EventId, handler_name: &str) -> Result<bool, DomainError>;

    /// Record that `handler_name` processed `event_id`. Idempotent.
    async fn mark_processed(
        &self,
        event_id: &EventId,
        handler_name: &str,
    ) -> Result<(), DomainError>;

    /// Drop entries recorded before `timestamp`. Returns how many were removed.
    async fn delete_before(&self, timestamp: Timestamp) -> Result<u64, DomainError>;
}
