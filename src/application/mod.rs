//! Application layer - Commands, event handlers and the relay-time mapper.
//!
//! Command handlers persist aggregate state together with outbox rows.
//! Event handlers consume integration events from the broker and are safe to
//! run more than once per event.

pub mod handlers;
mod integration_mapper;

pub use handlers::{
    // Journey commands
    CreateJourneyCommand, CreateJourneyHandler, CreateJourneyResult,
    DeleteJourneyCommand, DeleteJourneyHandler,
    FavoriteJourneyHandler, ShareJourneyCommand, ShareJourneyHandler,
    UpdateJourneyCommand, UpdateJourneyHandler, UpdateJourneyResult,
    // User commands
    ChangeUserStatusCommand, ChangeUserStatusHandler,
    // Consumers
    DailyGoalWatcher, FanoutReport, MonthlyDistanceProjector, NotificationFanout,
};
pub use integration_mapper::RelationshipIntegrationMapper;
