//! PostgreSQL implementation of RelationshipRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};

use crate::domain::foundation::{DomainError, JourneyId, Timestamp, UserId};
use crate::domain::journey::{Favorite, Share};
use crate::ports::RelationshipRepository;

use super::db_error;

#[derive(Clone)]
pub struct PostgresRelationshipRepository {
    pool: PgPool,
}

impl PostgresRelationshipRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn user_ids(&self, sql: &str, journey_id: &JourneyId) -> Result<Vec<UserId>, DomainError> {
        let ids: Vec<String> = sqlx::query_scalar(sql)
            .bind(journey_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("list journey followers"))?;

        ids.into_iter()
            .map(|id| UserId::new(id).map_err(DomainError::from))
            .collect()
    }
}

#[async_trait]
impl RelationshipRepository for PostgresRelationshipRepository {
    async fn add_favorite(&self, favorite: &Favorite) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO journey_favorites (journey_id, user_id, created_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (journey_id, user_id) DO NOTHING
            "#,
        )
        .bind(favorite.journey_id.as_uuid())
        .bind(favorite.user_id.as_str())
        .bind(favorite.created_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(db_error("add favorite"))?;
        Ok(())
    }

    async fn remove_favorite(
        &self,
        journey_id: &JourneyId,
        user_id: &UserId,
    ) -> Result<bool, DomainError> {
        let result =
            sqlx::query("DELETE FROM journey_favorites WHERE journey_id = $1 AND user_id = $2")
                .bind(journey_id.as_uuid())
                .bind(user_id.as_str())
                .execute(&self.pool)
                .await
                .map_err(db_error("remove favorite"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_favorite(
        &self,
        journey_id: &JourneyId,
        user_id: &UserId,
    ) -> Result<Option<Favorite>, DomainError> {
        let created_at: Option<DateTime<Utc>> = sqlx::query_scalar(
            "SELECT created_at FROM journey_favorites WHERE journey_id = $1 AND user_id = $2",
        )
        .bind(journey_id.as_uuid())
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("fetch favorite"))?;

        Ok(created_at.map(|at| Favorite {
            journey_id: *journey_id,
            user_id: user_id.clone(),
            created_at: Timestamp::from_datetime(at),
        }))
    }

    async fn favoriting_users(&self, journey_id: &JourneyId) -> Result<Vec<UserId>, DomainError> {
        self.user_ids(
            "SELECT user_id FROM journey_favorites WHERE journey_id = $1 ORDER BY user_id",
            journey_id,
        )
        .await
    }

    async fn add_share(&self, share: &Share) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO journey_shares (journey_id, shared_with_user_id, shared_by_user_id, created_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (journey_id, shared_with_user_id) DO NOTHING
            "#,
        )
        .bind(share.journey_id.as_uuid())
        .bind(share.shared_with_user_id.as_str())
        .bind(share.shared_by_user_id.as_str())
        .bind(share.created_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(db_error("add share"))?;
        Ok(())
    }

    async fn remove_share(
        &self,
        journey_id: &JourneyId,
        shared_with: &UserId,
    ) -> Result<bool, DomainError> {
        let result = sqlx::query(
            "DELETE FROM journey_shares WHERE journey_id = $1 AND shared_with_user_id = $2",
        )
        .bind(journey_id.as_uuid())
        .bind(shared_with.as_str())
        .execute(&self.pool)
        .await
        .map_err(db_error("remove share"))?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_share(
        &self,
        journey_id: &JourneyId,
        shared_with: &UserId,
    ) -> Result<Option<Share>, DomainError> {
        let row = sqlx::query(
            r#"
            SELECT shared_by_user_id, created_at
            FROM journey_shares
            WHERE journey_id = $1 AND shared_with_user_id = $2
            "#,
        )
        .bind(journey_id.as_uuid())
        .bind(shared_with.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error("fetch share"))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let map_err = |e: sqlx::Error| DomainError::database("read share row", e);
        let shared_by: String = row.try_get("shared_by_user_id").map_err(map_err)?;
        let created_at: DateTime<Utc> = row.try_get("created_at").map_err(map_err)?;

        Ok(Some(Share {
            journey_id: *journey_id,
            shared_with_user_id: shared_with.clone(),
            shared_by_user_id: UserId::new(shared_by)?,
            created_at: Timestamp::from_datetime(created_at),
        }))
    }

    async fn shared_with_users(
        &self,
        journey_id: &JourneyId,
    ) -> Result<Vec<UserId>, DomainError> {
        self.user_ids(
            "SELECT shared_with_user_id FROM journey_shares WHERE journey_id = $1 ORDER BY shared_with_user_id",
            journey_id,
        )
        .await
    }
}
