//! PostgreSQL implementation of ProcessedEventStore.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::foundation::{DomainError, EventId, Timestamp};
use crate::ports::ProcessedEventStore;

use super::db_error;

#[derive(Clone)]
pub struct PostgresProcessedEventStore {
    pool: PgPool,
}

impl PostgresProcessedEventStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProcessedEventStore for PostgresProcessedEventStore {
    async fn contains(&self, event_id: &EventId, handler_name: &str) -> Result<bool, DomainError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM processed_events WHERE event_id = $1 AND handler_name = $2)",
        )
        .bind(event_id.as_uuid())
        .bind(handler_name)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error("check processed event"))?;
        Ok(exists)
    }

    async fn mark_processed(
        &self,
        event_id: &EventId,
        handler_name: &str,
    ) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO processed_events (event_id, handler_name, processed_at)
            VALUES ($1, $2, now())
            ON CONFLICT (event_id, handler_name) DO NOTHING
            "#,
        )
        .bind(event_id.as_uuid())
        .bind(handler_name)
        .execute(&self.pool)
        .await
        .map_err(db_error("mark event processed"))?;
        Ok(())
    }

    async fn delete_before(&self, timestamp: Timestamp) -> Result<u64, DomainError> {
        let result = sqlx::query("DELETE FROM processed_events WHERE processed_at < $1")
            .bind(timestamp.as_datetime())
            .execute(&self.pool)
            .await
            .map_err(db_error("delete processed events"))?;
        Ok(result.rows_affected())
    }
}
