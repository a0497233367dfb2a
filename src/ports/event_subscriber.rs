//! EventSubscriber port - Routes received envelopes to handlers.
//!
//! A handler may see the same envelope more than once. Handlers either
//! deduplicate at the store level or are wrapped in `IdempotentHandler`.

use async_trait::async_trait;
use std::sync::Arc;

use crate::domain::foundation::{DomainError, EventEnvelope};

/// Consumer of one or more event types.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Process an envelope. An `Err` leaves the message unacknowledged.
    async fn handle(&self, event: EventEnvelope) -> Result<(), DomainError>;

    /// Stable name, used as the dedup scope and in logs.
    fn name(&self) -> &'static str;
}

pub trait EventSubscriber: Send + Sync {
    /// Register a handler for one event type.
    fn subscribe(&self, event_type: &str, handler: Arc<dyn EventHandler>);

    /// Register a handler for several event types.
    fn subscribe_all(&self, event_types: &[&str], handler: Arc<dyn EventHandler>) {
        for event_type in event_types {
            self.subscribe(event_type, handler.clone());
        }
    }
}

/// Anything that can both publish and route.
pub trait EventBus: super::EventPublisher + EventSubscriber {}

impl<T: super::EventPublisher + EventSubscriber> EventBus for T {}
