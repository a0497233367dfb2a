//! In-memory processed-event ledger.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::domain::foundation::{DomainError, EventId, Timestamp};
use crate::ports::ProcessedEventStore;

/// (event id, handler name) pairs with the time they were recorded.
#[derive(Default)]
pub struct InMemoryProcessedEventStore {
    processed: RwLock<HashMap<(EventId, String), Timestamp>>,
}

impl InMemoryProcessedEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.processed.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.processed.read().await.is_empty()
    }
}

#[async_trait]
impl ProcessedEventStore for InMemoryProcessedEventStore {
    async fn contains(&self, event_id: &EventId, handler_name: &str) -> Result<bool, DomainError> {
        Ok(self
            .processed
            .read()
            .await
            .contains_key(&(*event_id, handler_name.to_string())))
    }

    async fn mark_processed(
        &self,
        event_id: &EventId,
        handler_name: &str,
    ) -> Result<(), DomainError> {
        self.processed
            .write()
            .await
            .entry((*event_id, handler_name.to_string()))
            .or_insert_with(Timestamp::now);
        Ok(())
    }

    async fn delete_before(&self, timestamp: Timestamp) -> Result<u64, DomainError> {
        let mut processed = self.processed.write().await;
        let initial = processed.len();
        processed.retain(|_, at| !at.is_before(&timestamp));
        Ok((initial - processed.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn entries_are_per_handler() {
        let store = InMemoryProcessedEventStore::new();
        let id = EventId::new();

        store.mark_processed(&id, "MonthlyDistanceProjector").await.unwrap();

        assert!(store.contains(&id, "MonthlyDistanceProjector").await.unwrap());
        assert!(!store.contains(&id, "DailyGoalWatcher").await.unwrap());
    }

    #[tokio::test]
    async fn marking_twice_keeps_one_entry() {
        let store = InMemoryProcessedEventStore::new();
        let id = EventId::new();

        store.mark_processed(&id, "h").await.unwrap();
        store.mark_processed(&id, "h").await.unwrap();

        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn delete_before_drops_older_entries() {
        let store = InMemoryProcessedEventStore::new();
        store.mark_processed(&EventId::new(), "h").await.unwrap();

        let removed = store
            .delete_before(Timestamp::now().plus_secs(60))
            .await
            .unwrap();

        assert_eq!(removed, 1);
        assert!(store.is_empty().await);
    }
}
