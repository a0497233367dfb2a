//! PostgreSQL read-model stores.
//!
//! Both stores insert their dedup key first, inside the transaction that
//! changes the row. A concurrent duplicate blocks on the key's unique index
//! and then sees zero rows inserted.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use crate::domain::foundation::{DistanceKm, DomainError, MonthPeriod, Timestamp, UserId};
use crate::domain::outbox::OutboxEvent;
use crate::domain::reward::{DailyGoal, DailyRewardProgress};
use crate::domain::statistics::{AdjustmentOutcome, MonthlyAdjustment, MonthlyDistance, OnMissing};
use crate::ports::{
    ContributionOutcome, DailyRewardRepository, MonthlyDistanceRepository, OutboxRecord,
    RewardContribution,
};

use super::db_error;
use super::outbox::{insert_records, OutboxTable};

#[derive(Clone)]
pub struct PostgresMonthlyDistanceRepository {
    pool: PgPool,
}

impl PostgresMonthlyDistanceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MonthlyDistanceRepository for PostgresMonthlyDistanceRepository {
    async fn apply(
        &self,
        adjustment: &MonthlyAdjustment,
        now: Timestamp,
    ) -> Result<AdjustmentOutcome, DomainError> {
        let period = adjustment.period;
        let mut tx = self.pool.begin().await.map_err(db_error("begin transaction"))?;

        let fresh = sqlx::query(
            r#"
            INSERT INTO monthly_distance_adjustments (event_id, leg, applied_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (event_id, leg) DO NOTHING
            "#,
        )
        .bind(adjustment.key.event_id.as_uuid())
        .bind(adjustment.key.leg.as_str())
        .bind(now.as_datetime())
        .execute(&mut *tx)
        .await
        .map_err(db_error("record adjustment"))?
        .rows_affected()
            > 0;

        if !fresh {
            return Ok(AdjustmentOutcome::Duplicate);
        }

        if let OnMissing::CreateWith(total) = adjustment.on_missing {
            let created = sqlx::query(
                r#"
                INSERT INTO monthly_distances (user_id, year, month, total_hundredths, updated_at)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (user_id, year, month) DO NOTHING
                "#,
            )
            .bind(adjustment.user_id.as_str())
            .bind(period.year())
            .bind(period.month() as i32)
            .bind(total.hundredths())
            .bind(now.as_datetime())
            .execute(&mut *tx)
            .await
            .map_err(db_error("create monthly distance"))?
            .rows_affected()
                > 0;

            if created {
                tx.commit().await.map_err(db_error("commit adjustment"))?;
                return Ok(AdjustmentOutcome::Applied {
                    total,
                    clamped: false,
                });
            }
        }

        let current: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT total_hundredths FROM monthly_distances
            WHERE user_id = $1 AND year = $2 AND month = $3
            FOR UPDATE
            "#,
        )
        .bind(adjustment.user_id.as_str())
        .bind(period.year())
        .bind(period.month() as i32)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_error("lock monthly distance"))?;

        let Some(current) = current else {
            // The ledger entry stays so a redelivery is still a duplicate.
            tx.commit().await.map_err(db_error("commit adjustment"))?;
            return Ok(AdjustmentOutcome::SkippedMissing);
        };

        let mut row = MonthlyDistance::new(
            adjustment.user_id.clone(),
            period,
            DistanceKm::from_hundredths(current)?,
            now,
        );
        let clamped = row.apply(adjustment.delta, now);

        sqlx::query(
            r#"
            UPDATE monthly_distances SET total_hundredths = $4, updated_at = $5
            WHERE user_id = $1 AND year = $2 AND month = $3
            "#,
        )
        .bind(adjustment.user_id.as_str())
        .bind(period.year())
        .bind(period.month() as i32)
        .bind(row.total.hundredths())
        .bind(now.as_datetime())
        .execute(&mut *tx)
        .await
        .map_err(db_error("update monthly distance"))?;

        tx.commit().await.map_err(db_error("commit adjustment"))?;
        Ok(AdjustmentOutcome::Applied {
            total: row.total,
            clamped,
        })
    }

    async fn find(
        &self,
        user_id: &UserId,
        period: MonthPeriod,
    ) -> Result<Option<MonthlyDistance>, DomainError> {
        let row = sqlx::query(
            r#"
            SELECT user_id, year, month, total_hundredths, updated_at
            FROM monthly_distances
            WHERE user_id = $1 AND year = $2 AND month = $3
            "#,
        )
        .bind(user_id.as_str())
        .bind(period.year())
        .bind(period.month() as i32)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("fetch monthly distance"))?;

        row.map(row_to_monthly).transpose()
    }

    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<MonthlyDistance>, DomainError> {
        let rows = sqlx::query(
            r#"
            SELECT user_id, year, month, total_hundredths, updated_at
            FROM monthly_distances
            WHERE user_id = $1
            ORDER BY year, month
            "#,
        )
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error("list monthly distances"))?;

        rows.into_iter().map(row_to_monthly).collect()
    }
}

fn row_to_monthly(row: PgRow) -> Result<MonthlyDistance, DomainError> {
    let map_err = |e: sqlx::Error| DomainError::database("read monthly distance row", e);

    let user_id: String = row.try_get("user_id").map_err(map_err)?;
    let year: i32 = row.try_get("year").map_err(map_err)?;
    let month: i32 = row.try_get("month").map_err(map_err)?;
    let total: i64 = row.try_get("total_hundredths").map_err(map_err)?;
    let updated_at: DateTime<Utc> = row.try_get("updated_at").map_err(map_err)?;

    Ok(MonthlyDistance::new(
        UserId::new(user_id)?,
        MonthPeriod::new(year, month.max(0) as u32)?,
        DistanceKm::from_hundredths(total)?,
        Timestamp::from_datetime(updated_at),
    ))
}

/// Daily progress plus the reward outbox, written together.
#[derive(Clone)]
pub struct PostgresDailyRewardRepository {
    pool: PgPool,
}

impl PostgresDailyRewardRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DailyRewardRepository for PostgresDailyRewardRepository {
    async fn apply_contribution(
        &self,
        contribution: &RewardContribution,
        goal: &DailyGoal,
        now: Timestamp,
    ) -> Result<ContributionOutcome, DomainError> {
        let mut tx = self.pool.begin().await.map_err(db_error("begin transaction"))?;

        let fresh = sqlx::query(
            r#"
            INSERT INTO daily_reward_contributions (source_event_id, user_id, day, credited_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (source_event_id) DO NOTHING
            "#,
        )
        .bind(contribution.source_event_id.as_uuid())
        .bind(contribution.user_id.as_str())
        .bind(contribution.date)
        .bind(now.as_datetime())
        .execute(&mut *tx)
        .await
        .map_err(db_error("record contribution"))?
        .rows_affected()
            > 0;

        if !fresh {
            return Ok(ContributionOutcome::Duplicate);
        }

        sqlx::query(
            r#"
            INSERT INTO daily_reward_progress (user_id, day, total_hundredths, points, updated_at)
            VALUES ($1, $2, 0, 0, $3)
            ON CONFLICT (user_id, day) DO NOTHING
            "#,
        )
        .bind(contribution.user_id.as_str())
        .bind(contribution.date)
        .bind(now.as_datetime())
        .execute(&mut *tx)
        .await
        .map_err(db_error("create daily progress"))?;

        let row = sqlx::query(
            r#"
            SELECT user_id, day, total_hundredths, points, goal_achieved_at, updated_at
            FROM daily_reward_progress
            WHERE user_id = $1 AND day = $2
            FOR UPDATE
            "#,
        )
        .bind(contribution.user_id.as_str())
        .bind(contribution.date)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error("lock daily progress"))?;

        let current = row_to_progress(row)?;
        let (progress, achieved) = current.add_contribution(
            contribution.distance,
            goal,
            contribution.source_event_id,
            now,
        );

        sqlx::query(
            r#"
            UPDATE daily_reward_progress
            SET total_hundredths = $3, points = $4, goal_achieved_at = $5, updated_at = $6
            WHERE user_id = $1 AND day = $2
            "#,
        )
        .bind(contribution.user_id.as_str())
        .bind(contribution.date)
        .bind(progress.total_distance().hundredths())
        .bind(progress.points() as i32)
        .bind(progress.goal_achieved_at().map(|t| *t.as_datetime()))
        .bind(progress.updated_at().as_datetime())
        .execute(&mut *tx)
        .await
        .map_err(db_error("update daily progress"))?;

        if let Some(event) = &achieved {
            let record = OutboxRecord::from_event(&OutboxEvent::from(event.clone()))?;
            insert_records(&mut *tx, OutboxTable::Reward, &[record]).await?;
        }

        tx.commit().await.map_err(db_error("commit contribution"))?;
        Ok(ContributionOutcome::Applied { progress, achieved })
    }

    async fn find(
        &self,
        user_id: &UserId,
        date: NaiveDate,
    ) -> Result<Option<DailyRewardProgress>, DomainError> {
        let row = sqlx::query(
            r#"
            SELECT user_id, day, total_hundredths, points, goal_achieved_at, updated_at
            FROM daily_reward_progress
            WHERE user_id = $1 AND day = $2
            "#,
        )
        .bind(user_id.as_str())
        .bind(date)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("fetch daily progress"))?;

        row.map(row_to_progress).transpose()
    }
}

fn row_to_progress(row: PgRow) -> Result<DailyRewardProgress, DomainError> {
    let map_err = |e: sqlx::Error| DomainError::database("read daily progress row", e);

    let user_id: String = row.try_get("user_id").map_err(map_err)?;
    let day: NaiveDate = row.try_get("day").map_err(map_err)?;
    let total: i64 = row.try_get("total_hundredths").map_err(map_err)?;
    let points: i32 = row.try_get("points").map_err(map_err)?;
    let goal_achieved_at: Option<DateTime<Utc>> = row.try_get("goal_achieved_at").map_err(map_err)?;
    let updated_at: DateTime<Utc> = row.try_get("updated_at").map_err(map_err)?;

    Ok(DailyRewardProgress::reconstitute(
        UserId::new(user_id)?,
        day,
        DistanceKm::from_hundredths(total)?,
        points.max(0) as u32,
        goal_achieved_at.map(Timestamp::from_datetime),
        Timestamp::from_datetime(updated_at),
    ))
}
