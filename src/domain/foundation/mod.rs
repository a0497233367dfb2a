//! Foundation module - Shared domain primitives.
//!
//! Contains value objects, identifiers, event plumbing and error types
//! that form the vocabulary of the journey domain.

mod distance;
mod errors;
mod events;
mod ids;
mod period;
mod timestamp;

pub use distance::{DistanceDelta, DistanceKm};
pub use errors::{DecodeError, DomainError, ErrorCode, ValidationError};
pub use events::{domain_event, DomainEvent, EventEnvelope, EventId, EventMetadata};
pub use ids::{JourneyId, UserId};
pub use period::MonthPeriod;
pub use timestamp::Timestamp;
