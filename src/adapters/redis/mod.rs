//! Redis adapters.
//!
//! - `RedisStreamBus` - Event bus over Redis Streams with consumer groups
//! - `RedisConnectionRegistry` - Which server holds each user's realtime connection
//! - `RedisServerMessenger` - Pub/sub delivery to a specific server

mod connection_registry;
mod stream_bus;

pub use connection_registry::{RedisConnectionRegistry, RedisServerMessenger, ServerMessage};
pub use stream_bus::{RedisStreamBus, RedisStreamConfig};
