//! Redis configuration

use serde::Deserialize;
use std::time::Duration;

use crate::adapters::redis::RedisStreamConfig;

use super::error::ValidationError;

/// Redis Streams broker and connection registry configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL
    pub url: String,

    /// Prefix for stream keys (`{prefix}{event_type}`)
    #[serde(default = "default_stream_prefix")]
    pub stream_prefix: String,

    /// Consumer group shared by all instances
    #[serde(default = "default_consumer_group")]
    pub consumer_group: String,

    /// Consumer name, unique per process
    #[serde(default = "default_consumer_name")]
    pub consumer_name: String,

    /// Entries read per XREADGROUP call
    #[serde(default = "default_read_count")]
    pub read_count: usize,

    /// XREADGROUP block time in milliseconds
    #[serde(default = "default_block_ms")]
    pub block_ms: u64,

    /// Approximate stream length cap, 0 disables trimming
    #[serde(default = "default_max_len")]
    pub max_len: usize,

    /// Entries idle this long in another consumer's pending list are claimed,
    /// in seconds. 0 disables claiming.
    #[serde(default = "default_claim_min_idle")]
    pub claim_min_idle_secs: u64,

    /// Lifetime of a realtime connection registration in seconds
    #[serde(default = "default_connection_ttl")]
    pub connection_ttl_secs: u64,
}

impl RedisConfig {
    pub fn block(&self) -> Duration {
        Duration::from_millis(self.block_ms)
    }

    pub fn claim_min_idle(&self) -> Option<Duration> {
        (self.claim_min_idle_secs > 0).then(|| Duration::from_secs(self.claim_min_idle_secs))
    }

    pub fn connection_ttl(&self) -> Duration {
        Duration::from_secs(self.connection_ttl_secs)
    }

    /// Settings for the stream bus.
    pub fn stream_config(&self) -> RedisStreamConfig {
        RedisStreamConfig {
            stream_prefix: self.stream_prefix.clone(),
            consumer_group: self.consumer_group.clone(),
            consumer_name: self.consumer_name.clone(),
            read_count: self.read_count,
            block: self.block(),
            max_len: (self.max_len > 0).then_some(self.max_len),
            claim_min_idle: self.claim_min_idle(),
            ..RedisStreamConfig::default()
        }
    }

    /// Validate Redis configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.url.is_empty() {
            return Err(ValidationError::MissingRequired("JOURNEY_SYNC__REDIS__URL"));
        }
        if !self.url.starts_with("redis://") && !self.url.starts_with("rediss://") {
            return Err(ValidationError::InvalidRedisUrl);
        }
        if self.consumer_group.is_empty() {
            return Err(ValidationError::MissingRequired("JOURNEY_SYNC__REDIS__CONSUMER_GROUP"));
        }
        if self.consumer_name.is_empty() {
            return Err(ValidationError::MissingRequired("JOURNEY_SYNC__REDIS__CONSUMER_NAME"));
        }
        if self.read_count == 0 {
            return Err(ValidationError::MustBePositive("redis.read_count"));
        }
        if self.connection_ttl_secs == 0 {
            return Err(ValidationError::MustBePositive("redis.connection_ttl_secs"));
        }
        Ok(())
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            stream_prefix: default_stream_prefix(),
            consumer_group: default_consumer_group(),
            consumer_name: default_consumer_name(),
            read_count: default_read_count(),
            block_ms: default_block_ms(),
            max_len: default_max_len(),
            claim_min_idle_secs: default_claim_min_idle(),
            connection_ttl_secs: default_connection_ttl(),
        }
    }
}

fn default_stream_prefix() -> String {
    "journey-sync:".to_string()
}

fn default_consumer_group() -> String {
    "journey-sync".to_string()
}

fn default_consumer_name() -> String {
    "consumer-1".to_string()
}

fn default_read_count() -> usize {
    50
}

fn default_block_ms() -> u64 {
    2000
}

fn default_max_len() -> usize {
    100_000
}

fn default_claim_min_idle() -> u64 {
    60
}

fn default_connection_ttl() -> u64 {
    60
}
