//! PostgreSQL settings.
//!
//! Journeys, accounts, projections and the three outbox tables all live in
//! one database and share one pool.

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Largest pool a single instance may open.
pub const MAX_POOL_SIZE: u32 = 100;

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// `postgres://` or `postgresql://` URL.
    pub url: String,

    /// Connections shared by command handlers, relays and consumers.
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,

    /// Seconds to wait for a free connection. A timeout surfaces as a
    /// transient `DATABASE_ERROR`, so relays and consumers retry.
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,

    /// Apply the embedded migrations before serving.
    #[serde(default = "default_run_migrations")]
    pub run_migrations: bool,
}

impl DatabaseConfig {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.url.is_empty() {
            return Err(ValidationError::MissingRequired("JOURNEY_SYNC__DATABASE__URL"));
        }
        if !["postgres://", "postgresql://"]
            .iter()
            .any(|scheme| self.url.starts_with(scheme))
        {
            return Err(ValidationError::InvalidDatabaseUrl);
        }
        if self.pool_size == 0 {
            return Err(ValidationError::MustBePositive("database.pool_size"));
        }
        if self.pool_size > MAX_POOL_SIZE {
            return Err(ValidationError::TooLarge {
                field: "database.pool_size",
                max: u64::from(MAX_POOL_SIZE),
            });
        }
        if self.acquire_timeout_secs == 0 {
            return Err(ValidationError::MustBePositive("database.acquire_timeout_secs"));
        }
        Ok(())
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            pool_size: default_pool_size(),
            acquire_timeout_secs: default_acquire_timeout(),
            run_migrations: default_run_migrations(),
        }
    }
}

fn default_pool_size() -> u32 {
    10
}

fn default_acquire_timeout() -> u64 {
    5
}

fn default_run_migrations() -> bool {
    true
}
