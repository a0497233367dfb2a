//! PostgreSQL outbox tables.
//!
//! Repositories insert rows through [`insert_records`] inside their own
//! transaction; [`PostgresOutboxStore`] is the relay side.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, PgPool, Row};
use std::time::Duration;
use uuid::Uuid;

use crate::domain::foundation::{DomainError, ErrorCode, EventId, Timestamp};
use crate::ports::{OutboxRecord, OutboxStore};

/// The outbox tables created by the migrations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutboxTable {
    Journey,
    User,
    Reward,
}

impl OutboxTable {
    pub fn table_name(&self) -> &'static str {
        match self {
            OutboxTable::Journey => "journey_outbox",
            OutboxTable::User => "user_outbox",
            OutboxTable::Reward => "reward_outbox",
        }
    }
}

/// Insert rows on an open transaction.
pub(super) async fn insert_records(
    conn: &mut PgConnection,
    table: OutboxTable,
    records: &[OutboxRecord],
) -> Result<(), DomainError> {
    let sql = format!(
        r#"
        INSERT INTO {} (id, event_type, payload, occurred_at, attempts)
        VALUES ($1, $2, $3, $4, 0)
        "#,
        table.table_name()
    );

    for record in records {
        sqlx::query(&sql)
            .bind(record.id.as_uuid())
            .bind(&record.event_type)
            .bind(&record.payload)
            .bind(record.occurred_at.as_datetime())
            .execute(&mut *conn)
            .await
            .map_err(|e| {
                DomainError::new(
                    ErrorCode::DatabaseError,
                    format!("Failed to insert outbox row: {}", e),
                )
            })?;
    }

    Ok(())
}

/// Relay side of one outbox table.
#[derive(Clone)]
pub struct PostgresOutboxStore {
    pool: PgPool,
    table: OutboxTable,
}

impl PostgresOutboxStore {
    pub fn new(pool: PgPool, table: OutboxTable) -> Self {
        Self { pool, table }
    }

    fn table(&self) -> &'static str {
        self.table.table_name()
    }
}

#[async_trait]
impl OutboxStore for PostgresOutboxStore {
    async fn schema_ready(&self) -> Result<(), DomainError> {
        let found: Option<String> = sqlx::query_scalar("SELECT to_regclass($1)::text")
            .bind(self.table())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DomainError::database("schema check", e))?;

        match found {
            Some(_) => Ok(()),
            None => Err(DomainError::new(
                ErrorCode::DatabaseError,
                format!("Outbox table {} does not exist", self.table()),
            )),
        }
    }

    async fn claim_unprocessed(
        &self,
        limit: u32,
        lease: Duration,
    ) -> Result<Vec<OutboxRecord>, DomainError> {
        let sql = format!(
            r#"
            WITH claimable AS (
                SELECT id FROM {table}
                WHERE processed_at IS NULL
                  AND (claimed_until IS NULL OR claimed_until < now())
                ORDER BY occurred_at
                LIMIT $1
                FOR UPDATE SKIP LOCKED
            )
            UPDATE {table} o
            SET claimed_until = now() + make_interval(secs => $2),
                attempts = o.attempts + 1
            FROM claimable
            WHERE o.id = claimable.id
            RETURNING o.id, o.event_type, o.payload, o.occurred_at,
                      o.processed_at, o.error, o.attempts, o.claimed_until
            "#,
            table = self.table()
        );

        let rows = sqlx::query(&sql)
            .bind(limit as i64)
            .bind(lease.as_secs_f64())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                DomainError::new(
                    ErrorCode::DatabaseError,
                    format!("Failed to claim outbox rows: {}", e),
                )
            })?;

        let mut records = rows
            .into_iter()
            .map(row_to_record)
            .collect::<Result<Vec<_>, _>>()?;
        // RETURNING does not preserve the CTE's order.
        records.sort_by_key(|r| r.occurred_at);
        Ok(records)
    }

    async fn mark_processed(&self, id: &EventId, at: Timestamp) -> Result<(), DomainError> {
        let sql = format!(
            "UPDATE {} SET processed_at = $2, claimed_until = NULL, error = NULL WHERE id = $1",
            self.table()
        );
        sqlx::query(&sql)
            .bind(id.as_uuid())
            .bind(at.as_datetime())
            .execute(&self.pool)
            .await
            .map_err(|e| {
                DomainError::new(
                    ErrorCode::DatabaseError,
                    format!("Failed to mark outbox row processed: {}", e),
                )
            })?;
        Ok(())
    }

    async fn record_error(&self, id: &EventId, error: &str) -> Result<(), DomainError> {
        let sql = format!(
            "UPDATE {} SET error = $2, claimed_until = NULL WHERE id = $1",
            self.table()
        );
        sqlx::query(&sql)
            .bind(id.as_uuid())
            .bind(error)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                DomainError::new(
                    ErrorCode::DatabaseError,
                    format!("Failed to record outbox error: {}", e),
                )
            })?;
        Ok(())
    }

    async fn cleanup_processed(&self, before: Timestamp) -> Result<u64, DomainError> {
        let sql = format!(
            "DELETE FROM {} WHERE processed_at IS NOT NULL AND processed_at < $1",
            self.table()
        );
        let result = sqlx::query(&sql)
            .bind(before.as_datetime())
            .execute(&self.pool)
            .await
            .map_err(|e| {
                DomainError::new(
                    ErrorCode::DatabaseError,
                    format!("Failed to clean up outbox: {}", e),
                )
            })?;
        Ok(result.rows_affected())
    }
}

fn row_to_record(row: PgRow) -> Result<OutboxRecord, DomainError> {
    let map_err = |e: sqlx::Error| DomainError::database("read outbox row", e);

    let id: Uuid = row.try_get("id").map_err(map_err)?;
    let occurred_at: DateTime<Utc> = row.try_get("occurred_at").map_err(map_err)?;
    let processed_at: Option<DateTime<Utc>> = row.try_get("processed_at").map_err(map_err)?;
    let claimed_until: Option<DateTime<Utc>> = row.try_get("claimed_until").map_err(map_err)?;
    let attempts: i32 = row.try_get("attempts").map_err(map_err)?;

    Ok(OutboxRecord {
        id: EventId::from_uuid(id),
        event_type: row.try_get("event_type").map_err(map_err)?,
        payload: row.try_get("payload").map_err(map_err)?,
        occurred_at: Timestamp::from_datetime(occurred_at),
        processed_at: processed_at.map(Timestamp::from_datetime),
        error: row.try_get("error").map_err(map_err)?,
        attempts: attempts.max(0) as u32,
        claimed_until: claimed_until.map(Timestamp::from_datetime),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_names_match_migrations() {
        assert_eq!(OutboxTable::Journey.table_name(), "journey_outbox");
        assert_eq!(OutboxTable::User.table_name(), "user_outbox");
        assert_eq!(OutboxTable::Reward.table_name(), "reward_outbox");
    }
}
