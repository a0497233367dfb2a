//! Application configuration module
//!
//! Configuration is loaded from environment variables using the `config` and
//! `dotenvy` crates. Variables carry the `JOURNEY_SYNC` prefix and nested
//! values are separated by a double underscore.
//!
//! # Example
//!
//! ```no_run
//! use journey_sync::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//!
//! println!("Relaying {} rows per poll", config.relay.batch_size);
//! ```

mod database;
mod error;
mod redis;
mod relay;
mod reward;
mod telemetry;

pub use database::DatabaseConfig;
pub use error::{ConfigError, ValidationError};
pub use redis::RedisConfig;
pub use relay::RelayConfig;
pub use reward::RewardConfig;
pub use telemetry::TelemetryConfig;

use serde::Deserialize;

/// Root application configuration
///
/// Load using [`AppConfig::load()`] which reads from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// PostgreSQL connection and pool
    pub database: DatabaseConfig,

    /// Redis Streams broker and connection registry
    pub redis: RedisConfig,

    /// Outbox relay loop
    #[serde(default)]
    pub relay: RelayConfig,

    /// Daily goal threshold
    #[serde(default)]
    pub reward: RewardConfig,

    /// Logging
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// Loads `.env` if present, then reads `JOURNEY_SYNC__SECTION__KEY`
    /// variables, e.g. `JOURNEY_SYNC__RELAY__BATCH_SIZE=50`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or a value
    /// cannot be parsed.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("JOURNEY_SYNC")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// # Errors
    ///
    /// Returns the first `ValidationError` found.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.database.validate()?;
        self.redis.validate()?;
        self.relay.validate()?;
        self.reward.validate()?;
        self.telemetry.validate()?;
        Ok(())
    }

    /// Load and validate in one step.
    pub fn load_validated() -> Result<Self, ConfigError> {
        let config = Self::load()?;
        config.validate()?;
        Ok(config)
    }
}
