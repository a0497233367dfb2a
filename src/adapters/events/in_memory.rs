//! In-memory event bus.
//!
//! Delivers synchronously to subscribed handlers, which makes it
//! deterministic for tests and usable for single-process local runs. Every
//! published envelope is also captured for assertions.
//!
//! `fail_next_publishes` injects broker outages so the relay's retry path
//! can be exercised without a real broker.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::domain::foundation::{DomainError, ErrorCode, EventEnvelope};
use crate::ports::{EventHandler, EventPublisher, EventSubscriber};

type HandlerMap = HashMap<String, Vec<Arc<dyn EventHandler>>>;

/// In-memory event bus with capture and failure injection.
///
/// # Example
///
/// ```ignore
/// let bus = Arc::new(InMemoryEventBus::new());
/// bus.subscribe("journey.created.v1", projector);
///
/// bus.publish(envelope).await?;
/// assert!(bus.has_event("journey.created.v1"));
/// ```
pub struct InMemoryEventBus {
    handlers: RwLock<HandlerMap>,
    published: RwLock<Vec<EventEnvelope>>,
    failures_remaining: AtomicU32,
}

impl InMemoryEventBus {
    /// Creates a new empty event bus.
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
            published: RwLock::new(Vec::new()),
            failures_remaining: AtomicU32::new(0),
        }
    }

    /// Makes the next `count` publishes fail before anything is delivered.
    pub fn fail_next_publishes(&self, count: u32) {
        self.failures_remaining.store(count, Ordering::SeqCst);
    }

    // === Test Helpers ===

    /// Returns all accepted envelopes, in publish order.
    pub fn published_events(&self) -> Vec<EventEnvelope> {
        self.published_read().clone()
    }

    /// Returns accepted envelopes of a specific type.
    pub fn events_of_type(&self, event_type: &str) -> Vec<EventEnvelope> {
        self.published_read()
            .iter()
            .filter(|e| e.event_type == event_type)
            .cloned()
            .collect()
    }

    /// Returns count of accepted envelopes.
    pub fn event_count(&self) -> usize {
        self.published_read().len()
    }

    /// Checks if a specific event type was accepted.
    pub fn has_event(&self, event_type: &str) -> bool {
        self.published_read()
            .iter()
            .any(|e| e.event_type == event_type)
    }

    /// Clears captured envelopes.
    pub fn clear(&self) {
        self.published_write().clear();
    }

    // A panicking handler must not wedge the bus for everyone else.
    fn published_read(&self) -> RwLockReadGuard<'_, Vec<EventEnvelope>> {
        self.published.read().unwrap_or_else(|e| e.into_inner())
    }

    fn published_write(&self) -> RwLockWriteGuard<'_, Vec<EventEnvelope>> {
        self.published.write().unwrap_or_else(|e| e.into_inner())
    }

    fn handlers_for(&self, event_type: &str) -> Vec<Arc<dyn EventHandler>> {
        self.handlers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(event_type)
            .cloned()
            .unwrap_or_default()
    }

    fn take_injected_failure(&self) -> bool {
        self.failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventBus {
    async fn publish(&self, event: EventEnvelope) -> Result<(), DomainError> {
        if self.take_injected_failure() {
            return Err(DomainError::new(
                ErrorCode::BrokerError,
                "Broker unavailable (injected)",
            ));
        }

        self.published_write().push(event.clone());

        // Handlers are cloned out so no lock is held across awaits.
        let mut errors = Vec::new();
        for handler in self.handlers_for(&event.event_type) {
            if let Err(e) = handler.handle(event.clone()).await {
                errors.push(format!("{}: {}", handler.name(), e));
            }
        }

        if !errors.is_empty() {
            return Err(DomainError::new(
                ErrorCode::InternalError,
                format!("Handler errors: {}", errors.join(", ")),
            ));
        }

        Ok(())
    }
}

impl EventSubscriber for InMemoryEventBus {
    fn subscribe(&self, event_type: &str, handler: Arc<dyn EventHandler>) {
        self.handlers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .entry(event_type.to_string())
            .or_default()
            .push(handler);
    }
}
