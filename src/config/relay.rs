//! Outbox relay configuration

use serde::Deserialize;
use std::time::Duration;

use crate::adapters::events::OutboxRelayConfig;

use super::error::ValidationError;

/// Ten years.
pub const MAX_RETENTION_HOURS: u64 = 24 * 365 * 10;

/// Relay polling, leasing and retention settings
#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_batch_size")]
    pub batch_size: u32,

    /// How long a claimed row is hidden from other relays
    #[serde(default = "default_claim_lease")]
    pub claim_lease_secs: u64,

    #[serde(default = "default_schema_max_attempts")]
    pub schema_max_attempts: u32,

    #[serde(default = "default_schema_retry_delay")]
    pub schema_retry_delay_ms: u64,

    /// Processed rows older than this are deleted
    #[serde(default = "default_retention_hours")]
    pub retention_hours: u64,

    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_secs: u64,
}

impl RelayConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn claim_lease(&self) -> Duration {
        Duration::from_secs(self.claim_lease_secs)
    }

    /// Settings for one relay instance.
    pub fn relay_config(&self) -> OutboxRelayConfig {
        OutboxRelayConfig::default()
            .with_poll_interval(self.poll_interval())
            .with_batch_size(self.batch_size)
            .with_claim_lease(self.claim_lease())
            .with_schema_retries(
                self.schema_max_attempts,
                Duration::from_millis(self.schema_retry_delay_ms),
            )
            .with_retention(
                Duration::from_secs(self.retention_hours.saturating_mul(3600)),
                Duration::from_secs(self.cleanup_interval_secs),
            )
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.poll_interval_ms == 0 {
            return Err(ValidationError::MustBePositive("relay.poll_interval_ms"));
        }
        if self.batch_size == 0 {
            return Err(ValidationError::MustBePositive("relay.batch_size"));
        }
        if self.schema_max_attempts == 0 {
            return Err(ValidationError::MustBePositive("relay.schema_max_attempts"));
        }
        if self.cleanup_interval_secs == 0 {
            return Err(ValidationError::MustBePositive("relay.cleanup_interval_secs"));
        }
        if self.retention_hours > MAX_RETENTION_HOURS {
            return Err(ValidationError::TooLarge {
                field: "relay.retention_hours",
                max: MAX_RETENTION_HOURS,
            });
        }
        if self.claim_lease() <= self.poll_interval() {
            return Err(ValidationError::LeaseShorterThanPoll);
        }
        Ok(())
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
            batch_size: default_batch_size(),
            claim_lease_secs: default_claim_lease(),
            schema_max_attempts: default_schema_max_attempts(),
            schema_retry_delay_ms: default_schema_retry_delay(),
            retention_hours: default_retention_hours(),
            cleanup_interval_secs: default_cleanup_interval(),
        }
    }
}

fn default_poll_interval() -> u64 {
    1000
}

fn default_batch_size() -> u32 {
    100
}

fn default_claim_lease() -> u64 {
    30
}

fn default_schema_max_attempts() -> u32 {
    10
}

fn default_schema_retry_delay() -> u64 {
    2000
}

fn default_retention_hours() -> u64 {
    72
}

fn default_cleanup_interval() -> u64 {
    3600
}
