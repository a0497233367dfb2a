//! In-memory adapters.
//!
//! Used by tests and by the `memory` storage mode. Each mirrors the atomicity
//! of its Postgres counterpart by holding one lock across check and write.

mod connection_registry;
mod journey_repository;
mod outbox;
mod processed_event_store;
mod read_models;
mod relationship_repository;

pub use connection_registry::{Delivery, InMemoryConnectionRegistry, InMemoryServerMessenger};
pub use journey_repository::{InMemoryJourneyRepository, InMemoryUserAccountRepository};
pub use outbox::InMemoryOutbox;
pub use processed_event_store::InMemoryProcessedEventStore;
pub use read_models::{InMemoryDailyRewardRepository, InMemoryMonthlyDistanceRepository};
pub use relationship_repository::InMemoryRelationshipRepository;
