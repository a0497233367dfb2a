//! IdempotentHandler - Per-(event, handler) dedup for at-least-once delivery.
//!
//! Wraps any `EventHandler` and consults a `ProcessedEventStore` keyed by the
//! envelope's event id and the inner handler's name.
//!
//! 1. Already recorded: skip and return `Ok`
//! 2. Otherwise delegate to the inner handler
//! 3. Record only after the inner handler succeeded
//!
//! A failed attempt is never recorded, so the broker's redelivery retries it.
//! The check and the record are two steps; handlers whose side effects must
//! not repeat under concurrent delivery also deduplicate in their own store.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::domain::foundation::{DomainError, EventEnvelope};
use crate::ports::{EventHandler, ProcessedEventStore};

/// Decorates an `EventHandler` with idempotency tracking.
pub struct IdempotentHandler<H: EventHandler> {
    inner: H,
    processed_events: Arc<dyn ProcessedEventStore>,
}

impl<H: EventHandler> IdempotentHandler<H> {
    pub fn new(inner: H, processed_events: Arc<dyn ProcessedEventStore>) -> Self {
        Self {
            inner,
            processed_events,
        }
    }

    /// The wrapped handler.
    pub fn inner(&self) -> &H {
        &self.inner
    }
}

#[async_trait]
impl<H: EventHandler + 'static> EventHandler for IdempotentHandler<H> {
    async fn handle(&self, envelope: EventEnvelope) -> Result<(), DomainError> {
        let handler_name = self.inner.name();

        if self
            .processed_events
            .contains(&envelope.event_id, handler_name)
            .await?
        {
            debug!(
                event_id = %envelope.event_id,
                handler = handler_name,
                "Skipping duplicate event"
            );
            return Ok(());
        }

        let event_id = envelope.event_id;
        self.inner.handle(envelope).await?;

        self.processed_events
            .mark_processed(&event_id, handler_name)
            .await?;

        Ok(())
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryProcessedEventStore;
    use crate::domain::foundation::{ErrorCode, EventId, Timestamp};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingHandler {
        name: &'static str,
        count: AtomicUsize,
    }

    impl CountingHandler {
        fn named(name: &'static str) -> Self {
            Self {
                name,
                count: AtomicUsize::new(0),
            }
        }

        fn invocations(&self) -> usize {
            self.count.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl EventHandler for CountingHandler {
        async fn handle(&self, _: EventEnvelope) -> Result<(), DomainError> {
            self.count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn name(&self) -> &'static str {
            self.name
        }
    }

    /// Fails until `succeed_after` attempts have been made.
    struct FlakyHandler {
        attempts: AtomicUsize,
        succeed_after: usize,
    }

    #[async_trait]
    impl EventHandler for FlakyHandler {
        async fn handle(&self, _: EventEnvelope) -> Result<(), DomainError> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
            if attempt < self.succeed_after {
                Err(DomainError::new(ErrorCode::DatabaseError, "transient"))
            } else {
                Ok(())
            }
        }

        fn name(&self) -> &'static str {
            "FlakyHandler"
        }
    }

    fn test_envelope() -> EventEnvelope {
        EventEnvelope::new(
            EventId::new(),
            "journey.created.v1",
            "journey-1",
            "Journey",
            Timestamp::now(),
            json!({}),
        )
    }

    fn store() -> Arc<InMemoryProcessedEventStore> {
        Arc::new(InMemoryProcessedEventStore::new())
    }

    #[tokio::test]
    async fn duplicate_delivery_is_skipped() {
        let handler = IdempotentHandler::new(CountingHandler::named("Projector"), store());
        let envelope = test_envelope();

        handler.handle(envelope.clone()).await.unwrap();
        handler.handle(envelope).await.unwrap();

        assert_eq!(handler.inner().invocations(), 1);
    }

    #[tokio::test]
    async fn distinct_events_are_all_processed() {
        let handler = IdempotentHandler::new(CountingHandler::named("Projector"), store());

        for _ in 0..3 {
            handler.handle(test_envelope()).await.unwrap();
        }

        assert_eq!(handler.inner().invocations(), 3);
    }

    #[tokio::test]
    async fn failure_is_not_recorded_and_retry_succeeds() {
        let store = store();
        let handler = IdempotentHandler::new(
            FlakyHandler {
                attempts: AtomicUsize::new(0),
                succeed_after: 2,
            },
            store.clone(),
        );
        let envelope = test_envelope();

        assert!(handler.handle(envelope.clone()).await.is_err());
        assert!(!store
            .contains(&envelope.event_id, "FlakyHandler")
            .await
            .unwrap());

        assert!(handler.handle(envelope.clone()).await.is_err());
        assert!(handler.handle(envelope.clone()).await.is_ok());
        assert!(handler.handle(envelope).await.is_ok());

        assert_eq!(handler.inner().attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn handlers_are_deduplicated_independently() {
        let store = store();
        let a = IdempotentHandler::new(CountingHandler::named("MonthlyDistance"), store.clone());
        let b = IdempotentHandler::new(CountingHandler::named("DailyGoal"), store);
        let envelope = test_envelope();

        a.handle(envelope.clone()).await.unwrap();
        b.handle(envelope.clone()).await.unwrap();
        a.handle(envelope.clone()).await.unwrap();
        b.handle(envelope).await.unwrap();

        assert_eq!(a.inner().invocations(), 1);
        assert_eq!(b.inner().invocations(), 1);
    }

    #[tokio::test]
    async fn name_delegates_to_inner() {
        let handler = IdempotentHandler::new(CountingHandler::named("Fanout"), store());
        assert_eq!(handler.name(), "Fanout");
    }
}
