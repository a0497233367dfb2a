//! Journey Sync - Event propagation for journey tracking.
//!
//! Journey and user mutations are stored together with outbox rows. Relays
//! publish those rows to Redis Streams, and idempotent consumers keep monthly
//! distance totals, daily goal rewards and follower notifications in step.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
pub mod telemetry;
