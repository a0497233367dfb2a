//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! ## Write-side Ports
//!
//! - `JourneyRepository` / `UserAccountRepository` - Aggregate state plus outbox rows, atomically
//! - `RelationshipRepository` - Favorites and shares
//! - `OutboxStore` - Relay side of the transactional outbox
//! - `IntegrationEventMapper` - Domain event to wire event, with relay-time reads
//!
//! ## Read-model Ports
//!
//! - `MonthlyDistanceRepository` - Per-user monthly totals
//! - `DailyRewardRepository` - Per-user daily progress and goal crossing
//!
//! ## Event Ports
//!
//! - `EventPublisher` / `EventSubscriber` / `EventHandler` - Broker abstraction
//! - `ProcessedEventStore` - Idempotency tracking for event handlers
//!
//! ## Notification Ports
//!
//! - `ConnectionRegistry` / `ServerMessenger` - Realtime connection lookup and routing
//! - `PushNotifier` / `FallbackNotifier` - Realtime push and its durable fallback

mod connection_registry;
mod event_publisher;
mod event_subscriber;
mod integration_mapper;
mod journey_repository;
mod notifier;
mod outbox_store;
mod processed_event_store;
mod read_models;
mod relationship_repository;
mod user_account_repository;

pub use connection_registry::{
    ConnectionRegistry, ConnectionRegistryError, ServerId, ServerMessenger,
};
pub use event_publisher::EventPublisher;
pub use event_subscriber::{EventBus, EventHandler, EventSubscriber};
pub use integration_mapper::IntegrationEventMapper;
pub use journey_repository::JourneyRepository;
pub(crate) use journey_repository::{journey_not_found, version_conflict};
pub use notifier::{FallbackNotifier, Notification, NotificationKind, PushNotifier};
pub use outbox_store::{OutboxRecord, OutboxStore};
pub use processed_event_store::ProcessedEventStore;
pub use read_models::{
    ContributionOutcome, DailyRewardRepository, MonthlyDistanceRepository, RewardContribution,
};
pub use relationship_repository::RelationshipRepository;
pub use user_account_repository::UserAccountRepository;
