//! IntegrationEventMapper port - Domain event to wire event, at relay time.
//!
//! Mapping may read current state (e.g. who favorited a journey), so it
//! runs when the relay publishes, not when the mutation commits.

use async_trait::async_trait;

use crate::domain::foundation::DomainError;
use crate::domain::integration::IntegrationEvent;
use crate::domain::outbox::OutboxEvent;

#[async_trait]
pub trait IntegrationEventMapper: Send + Sync {
    /// Build the integration event for `event`.
    ///
    /// Errors are treated as transient by the relay: the row keeps its
    /// `processed_at = NULL` and is retried on a later poll.
    async fn map(&self, event: &OutboxEvent) -> Result<IntegrationEvent, DomainError>;
}
