//! In-memory outbox table.
//!
//! Shared by the in-memory repositories, which append to it inside their own
//! critical section, and by the relay through `OutboxStore`.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

use crate::domain::foundation::{DomainError, ErrorCode, EventId, Timestamp};
use crate::ports::{OutboxRecord, OutboxStore};

/// Outbox rows held in memory, in insertion order.
#[derive(Default)]
pub struct InMemoryOutbox {
    rows: Mutex<Vec<OutboxRecord>>,
    schema_failures_remaining: AtomicU32,
}

impl InMemoryOutbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` schema checks fail.
    pub fn fail_schema_checks(&self, count: u32) {
        self.schema_failures_remaining.store(count, Ordering::SeqCst);
    }

    /// Appends rows. Callers hold their own state lock while doing so.
    pub async fn append(&self, records: Vec<OutboxRecord>) {
        self.rows.lock().await.extend(records);
    }

    /// Every row, processed or not.
    pub async fn rows(&self) -> Vec<OutboxRecord> {
        self.rows.lock().await.clone()
    }

    /// Rows whose publish has not been confirmed.
    pub async fn pending(&self) -> Vec<OutboxRecord> {
        self.rows
            .lock()
            .await
            .iter()
            .filter(|r| r.is_pending())
            .cloned()
            .collect()
    }

    pub async fn get(&self, id: &EventId) -> Option<OutboxRecord> {
        self.rows.lock().await.iter().find(|r| &r.id == id).cloned()
    }

    async fn update<F>(&self, id: &EventId, f: F) -> Result<(), DomainError>
    where
        F: FnOnce(&mut OutboxRecord),
    {
        let mut rows = self.rows.lock().await;
        let row = rows.iter_mut().find(|r| &r.id == id).ok_or_else(|| {
            DomainError::new(ErrorCode::InternalError, format!("Outbox row {} not found", id))
        })?;
        f(row);
        Ok(())
    }
}

#[async_trait]
impl OutboxStore for InMemoryOutbox {
    async fn schema_ready(&self) -> Result<(), DomainError> {
        let failed = self
            .schema_failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(DomainError::database("schema check", "outbox table missing"));
        }
        Ok(())
    }

    async fn claim_unprocessed(
        &self,
        limit: u32,
        lease: Duration,
    ) -> Result<Vec<OutboxRecord>, DomainError> {
        let now = Timestamp::now();
        let until = now.plus_secs(lease.as_secs().max(1) as i64);

        let mut rows = self.rows.lock().await;
        let mut candidates: Vec<usize> = rows
            .iter()
            .enumerate()
            .filter(|(_, r)| r.is_pending() && !r.is_claimed_at(now))
            .map(|(i, _)| i)
            .collect();
        candidates.sort_by_key(|&i| rows[i].occurred_at);
        candidates.truncate(limit as usize);

        let mut claimed = Vec::with_capacity(candidates.len());
        for i in candidates {
            let row = &mut rows[i];
            row.claimed_until = Some(until);
            row.attempts += 1;
            claimed.push(row.clone());
        }
        Ok(claimed)
    }

    async fn mark_processed(&self, id: &EventId, at: Timestamp) -> Result<(), DomainError> {
        self.update(id, |row| {
            row.processed_at = Some(at);
            row.claimed_until = None;
            row.error = None;
        })
        .await
    }

    async fn record_error(&self, id: &EventId, error: &str) -> Result<(), DomainError> {
        self.update(id, |row| {
            row.error = Some(error.to_string());
            row.claimed_until = None;
        })
        .await
    }

    async fn cleanup_processed(&self, before: Timestamp) -> Result<u64, DomainError> {
        let mut rows = self.rows.lock().await;
        let initial = rows.len();
        rows.retain(|r| match r.processed_at {
            Some(at) => !at.is_before(&before),
            None => true,
        });
        Ok((initial - rows.len()) as u64)
    }
}
