//! PostgreSQL adapters.
//!
//! - `PostgresJourneyRepository`, `PostgresUserAccountRepository` - aggregate state plus outbox rows
//! - `PostgresOutboxStore` - relay side of one outbox table
//! - `PostgresRelationshipRepository` - favorites and shares
//! - `PostgresMonthlyDistanceRepository`, `PostgresDailyRewardRepository` - read models
//! - `PostgresProcessedEventStore` - handler dedup ledger

mod journey_repository;
mod outbox;
mod processed_event_store;
mod read_models;
mod relationship_repository;

pub use journey_repository::{PostgresJourneyRepository, PostgresUserAccountRepository};
pub use outbox::{OutboxTable, PostgresOutboxStore};
pub use processed_event_store::PostgresProcessedEventStore;
pub use read_models::{PostgresDailyRewardRepository, PostgresMonthlyDistanceRepository};
pub use relationship_repository::PostgresRelationshipRepository;

use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::config::DatabaseConfig;
use crate::domain::foundation::{DomainError, ErrorCode};

/// Migrations embedded from `./migrations`.
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Open a pool sized and timed by `config`.
pub async fn connect_pool(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.pool_size)
        .acquire_timeout(config.acquire_timeout())
        .connect(&config.url)
        .await
}

pub(super) fn db_error(action: &str) -> impl Fn(sqlx::Error) -> DomainError + '_ {
    move |e| {
        DomainError::new(
            ErrorCode::DatabaseError,
            format!("Failed to {}: {}", action, e),
        )
    }
}
