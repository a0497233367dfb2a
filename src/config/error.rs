//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid database URL format")]
    InvalidDatabaseUrl,

    #[error("Invalid Redis URL format")]
    InvalidRedisUrl,

    #[error("{0} must be greater than zero")]
    MustBePositive(&'static str),

    #[error("{field} must not exceed {max}")]
    TooLarge { field: &'static str, max: u64 },

    #[error("Claim lease must be longer than the poll interval")]
    LeaseShorterThanPoll,

    #[error("Invalid daily goal distance: {0}")]
    InvalidGoalDistance(String),

    #[error("Invalid log filter: {0}")]
    InvalidLogFilter(String),
}
