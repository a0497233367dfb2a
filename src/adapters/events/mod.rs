//! Event bus adapters.
//!
//! Adapters implement the event publishing and subscribing ports
//! for different environments:
//!
//! - `InMemoryEventBus` - Synchronous, in-process bus for testing
//! - `IdempotentHandler` - Wrapper for at-most-once event processing
//! - `OutboxRelay` - Background service that drains an outbox to the broker

mod idempotent_handler;
mod in_memory;
mod outbox_relay;

pub use idempotent_handler::IdempotentHandler;
pub use in_memory::InMemoryEventBus;
pub use outbox_relay::{OutboxRelay, OutboxRelayConfig, RelayError, RelayReport};
