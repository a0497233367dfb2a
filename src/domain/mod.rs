//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (value objects, IDs, errors, events)
//! - `journey` - Journey aggregate and its events
//! - `user` - User account status lifecycle
//! - `reward` - Daily goal progress and the goal-crossing rule
//! - `statistics` - Monthly distance read model and adjustment planning
//! - `outbox` - Closed set of events stored in outbox tables
//! - `integration` - Wire contract published to the broker

pub mod foundation;
pub mod integration;
pub mod journey;
pub mod outbox;
pub mod reward;
pub mod statistics;
pub mod user;
