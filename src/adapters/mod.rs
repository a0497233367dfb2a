//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the domain to external systems:
//! - `events` - Event bus, idempotent handler decorator and the outbox relay
//! - `memory` - In-memory repositories and stores for tests and local runs
//! - `notification` - Realtime push and fallback senders
//! - `postgres` - PostgreSQL repositories, outbox tables and read models
//! - `redis` - Redis Streams broker and connection registry

pub mod events;
pub mod memory;
pub mod notification;
pub mod postgres;
pub mod redis;

pub use events::{
    IdempotentHandler, InMemoryEventBus, OutboxRelay, OutboxRelayConfig, RelayError, RelayReport,
};
