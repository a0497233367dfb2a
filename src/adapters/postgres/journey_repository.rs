//! PostgreSQL implementations of JourneyRepository and UserAccountRepository.
//!
//! State and outbox rows are written in one transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::domain::foundation::{
    DistanceKm, DomainError, ErrorCode, JourneyId, Timestamp, UserId,
};
use crate::domain::journey::{Journey, JourneyDetails, Location, TransportType};
use crate::domain::outbox::OutboxEvent;
use crate::domain::user::{UserAccount, UserStatus};
use crate::ports::{
    journey_not_found, version_conflict, JourneyRepository, OutboxRecord, UserAccountRepository,
};

use super::db_error;
use super::outbox::{insert_records, OutboxTable};

/// PostgreSQL implementation of JourneyRepository.
#[derive(Clone)]
pub struct PostgresJourneyRepository {
    pool: PgPool,
}

impl PostgresJourneyRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Tells a stale write apart from a missing row after 0 rows matched.
async fn miss_reason(
    conn: &mut sqlx::PgConnection,
    id: &JourneyId,
    expected: u32,
) -> Result<DomainError, DomainError> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM journeys WHERE id = $1)")
        .bind(id.as_uuid())
        .fetch_one(conn)
        .await
        .map_err(db_error("check journey exists"))?;

    Ok(if exists {
        version_conflict(id, expected)
    } else {
        journey_not_found(id)
    })
}

#[async_trait]
impl JourneyRepository for PostgresJourneyRepository {
    async fn save(&self, journey: &Journey, events: &[OutboxEvent]) -> Result<(), DomainError> {
        let records = OutboxRecord::from_events(events)?;
        let details = journey.details();

        let mut tx = self.pool.begin().await.map_err(db_error("begin transaction"))?;

        if journey.version() <= 1 {
            let result = sqlx::query(
                r#"
                INSERT INTO journeys (
                    id, user_id, start_location, start_time, arrival_location, arrival_time,
                    transport_type, distance_hundredths, version, created_at, updated_at
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                ON CONFLICT (id) DO NOTHING
                "#,
            )
            .bind(journey.id().as_uuid())
            .bind(journey.user_id().as_str())
            .bind(details.start_location.as_str())
            .bind(details.start_time.as_datetime())
            .bind(details.arrival_location.as_str())
            .bind(details.arrival_time.as_datetime())
            .bind(details.transport_type.as_str())
            .bind(details.distance_km.hundredths())
            .bind(i64::from(journey.version()))
            .bind(journey.created_at().as_datetime())
            .bind(journey.updated_at().as_datetime())
            .execute(&mut *tx)
            .await
            .map_err(db_error("insert journey"))?;

            if result.rows_affected() == 0 {
                return Err(version_conflict(&journey.id(), 0));
            }
        } else {
            let expected = journey.version() - 1;
            let result = sqlx::query(
                r#"
                UPDATE journeys SET
                    start_location = $2,
                    start_time = $3,
                    arrival_location = $4,
                    arrival_time = $5,
                    transport_type = $6,
                    distance_hundredths = $7,
                    version = $8,
                    updated_at = $9
                WHERE id = $1 AND version = $10
                "#,
            )
            .bind(journey.id().as_uuid())
            .bind(details.start_location.as_str())
            .bind(details.start_time.as_datetime())
            .bind(details.arrival_location.as_str())
            .bind(details.arrival_time.as_datetime())
            .bind(details.transport_type.as_str())
            .bind(details.distance_km.hundredths())
            .bind(i64::from(journey.version()))
            .bind(journey.updated_at().as_datetime())
            .bind(i64::from(expected))
            .execute(&mut *tx)
            .await
            .map_err(db_error("update journey"))?;

            if result.rows_affected() == 0 {
                return Err(miss_reason(&mut *tx, &journey.id(), expected).await?);
            }
        }

        insert_records(&mut *tx, OutboxTable::Journey, &records).await?;

        tx.commit().await.map_err(db_error("commit journey"))?;
        Ok(())
    }

    async fn delete(&self, journey: &Journey, events: &[OutboxEvent]) -> Result<(), DomainError> {
        let records = OutboxRecord::from_events(events)?;
        let id = journey.id();

        let mut tx = self.pool.begin().await.map_err(db_error("begin transaction"))?;

        let result = sqlx::query("DELETE FROM journeys WHERE id = $1 AND version = $2")
            .bind(id.as_uuid())
            .bind(i64::from(journey.version()))
            .execute(&mut *tx)
            .await
            .map_err(db_error("delete journey"))?;

        if result.rows_affected() == 0 {
            return Err(miss_reason(&mut *tx, &id, journey.version()).await?);
        }

        insert_records(&mut *tx, OutboxTable::Journey, &records).await?;

        tx.commit().await.map_err(db_error("commit journey delete"))?;
        Ok(())
    }

    async fn find_by_id(&self, id: &JourneyId) -> Result<Option<Journey>, DomainError> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, start_location, start_time, arrival_location, arrival_time,
                   transport_type, distance_hundredths, version, created_at, updated_at
            FROM journeys
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("fetch journey"))?;

        row.map(row_to_journey).transpose()
    }
}

fn row_to_journey(row: PgRow) -> Result<Journey, DomainError> {
    let map_err = |e: sqlx::Error| DomainError::database("read journey row", e);

    let id: Uuid = row.try_get("id").map_err(map_err)?;
    let user_id: String = row.try_get("user_id").map_err(map_err)?;
    let start_location: String = row.try_get("start_location").map_err(map_err)?;
    let start_time: DateTime<Utc> = row.try_get("start_time").map_err(map_err)?;
    let arrival_location: String = row.try_get("arrival_location").map_err(map_err)?;
    let arrival_time: DateTime<Utc> = row.try_get("arrival_time").map_err(map_err)?;
    let transport_type: String = row.try_get("transport_type").map_err(map_err)?;
    let distance: i64 = row.try_get("distance_hundredths").map_err(map_err)?;
    let version: i64 = row.try_get("version").map_err(map_err)?;
    let created_at: DateTime<Utc> = row.try_get("created_at").map_err(map_err)?;
    let updated_at: DateTime<Utc> = row.try_get("updated_at").map_err(map_err)?;

    let details = JourneyDetails {
        start_location: Location::new(start_location)?,
        start_time: Timestamp::from_datetime(start_time),
        arrival_location: Location::new(arrival_location)?,
        arrival_time: Timestamp::from_datetime(arrival_time),
        transport_type: transport_type.parse::<TransportType>()?,
        distance_km: DistanceKm::from_hundredths(distance)?,
    };

    Ok(Journey::reconstitute(
        JourneyId::from_uuid(id),
        UserId::new(user_id)?,
        details,
        u32::try_from(version).map_err(|_| {
            DomainError::new(ErrorCode::DatabaseError, format!("invalid journey version {}", version))
        })?,
        Timestamp::from_datetime(created_at),
        Timestamp::from_datetime(updated_at),
    ))
}

/// PostgreSQL implementation of UserAccountRepository.
#[derive(Clone)]
pub struct PostgresUserAccountRepository {
    pool: PgPool,
}

impl PostgresUserAccountRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserAccountRepository for PostgresUserAccountRepository {
    async fn save(&self, account: &UserAccount, events: &[OutboxEvent]) -> Result<(), DomainError> {
        let records = OutboxRecord::from_events(events)?;

        let mut tx = self.pool.begin().await.map_err(db_error("begin transaction"))?;

        sqlx::query(
            r#"
            INSERT INTO user_accounts (id, status, updated_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE SET
                status = EXCLUDED.status,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(account.id().as_str())
        .bind(account.status().as_str())
        .bind(account.updated_at().as_datetime())
        .execute(&mut *tx)
        .await
        .map_err(db_error("save user account"))?;

        insert_records(&mut *tx, OutboxTable::User, &records).await?;

        tx.commit().await.map_err(db_error("commit user account"))?;
        Ok(())
    }

    async fn find_by_id(&self, id: &UserId) -> Result<Option<UserAccount>, DomainError> {
        let row = sqlx::query("SELECT id, status, updated_at FROM user_accounts WHERE id = $1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("fetch user account"))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let map_err = |e: sqlx::Error| DomainError::database("read user account row", e);
        let status: String = row.try_get("status").map_err(map_err)?;
        let updated_at: DateTime<Utc> = row.try_get("updated_at").map_err(map_err)?;

        Ok(Some(UserAccount::reconstitute(
            id.clone(),
            status.parse::<UserStatus>()?,
            Timestamp::from_datetime(updated_at),
        )))
    }
}
