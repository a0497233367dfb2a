//! EventPublisher port - Hands envelopes to the broker.
//!
//! Returning `Ok` means the broker accepted the message. The relay only marks
//! an outbox row processed after that.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, EventEnvelope};

#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish one envelope.
    async fn publish(&self, event: EventEnvelope) -> Result<(), DomainError>;

    /// Publish several envelopes in order, stopping at the first failure.
    async fn publish_all(&self, events: Vec<EventEnvelope>) -> Result<(), DomainError> {
        for event in events {
            self.publish(event).await?;
        }
        Ok(())
    }
}
