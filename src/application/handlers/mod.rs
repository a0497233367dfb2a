//! Application handlers.
//!
//! Command handlers for the write side and event handlers for the
//! consumers downstream of the broker.

pub mod journey;
pub mod notification;
pub mod reward;
pub mod statistics;
pub mod user;

pub use journey::{
    CreateJourneyCommand, CreateJourneyHandler, CreateJourneyResult, DeleteJourneyCommand,
    DeleteJourneyHandler, FavoriteJourneyHandler, ShareJourneyCommand, ShareJourneyHandler,
    UpdateJourneyCommand, UpdateJourneyHandler, UpdateJourneyResult,
};
pub use notification::{FanoutReport, NotificationFanout};
pub use reward::DailyGoalWatcher;
pub use statistics::MonthlyDistanceProjector;
pub use user::{ChangeUserStatusCommand, ChangeUserStatusHandler};
