//! Events that travel through an outbox table.
//!
//! `OutboxEvent` is the closed set of domain events a repository may append
//! to its outbox. The relay reads the stored `(event_type, payload)` pair back
//! through [`OutboxEvent::decode`], which matches the tag exhaustively.

use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

use crate::domain::foundation::{DecodeError, DomainEvent, EventId, Timestamp};
use crate::domain::journey::{JourneyCreated, JourneyDeleted, JourneyEvent, JourneyUpdated};
use crate::domain::reward::DailyGoalAchieved;
use crate::domain::user::UserStatusChanged;

/// A domain event as persisted in an outbox row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboxEvent {
    JourneyCreated(JourneyCreated),
    JourneyUpdated(JourneyUpdated),
    JourneyDeleted(JourneyDeleted),
    UserStatusChanged(UserStatusChanged),
    DailyGoalAchieved(DailyGoalAchieved),
}

impl OutboxEvent {
    /// Rebuilds an event from a stored row.
    ///
    /// # Errors
    ///
    /// - `UnknownEventType` if `event_type` names no known event
    /// - `Malformed` if the payload does not match the event's shape
    pub fn decode(event_type: &str, payload: &JsonValue) -> Result<Self, DecodeError> {
        match event_type {
            JourneyCreated::EVENT_TYPE => parse(event_type, payload).map(Self::JourneyCreated),
            JourneyUpdated::EVENT_TYPE => parse(event_type, payload).map(Self::JourneyUpdated),
            JourneyDeleted::EVENT_TYPE => parse(event_type, payload).map(Self::JourneyDeleted),
            UserStatusChanged::EVENT_TYPE => {
                parse(event_type, payload).map(Self::UserStatusChanged)
            }
            DailyGoalAchieved::EVENT_TYPE => {
                parse(event_type, payload).map(Self::DailyGoalAchieved)
            }
            other => Err(DecodeError::UnknownEventType(other.to_string())),
        }
    }

    /// Serializes the event body for storage.
    pub fn payload(&self) -> Result<JsonValue, serde_json::Error> {
        match self {
            Self::JourneyCreated(e) => serde_json::to_value(e),
            Self::JourneyUpdated(e) => serde_json::to_value(e),
            Self::JourneyDeleted(e) => serde_json::to_value(e),
            Self::UserStatusChanged(e) => serde_json::to_value(e),
            Self::DailyGoalAchieved(e) => serde_json::to_value(e),
        }
    }

    /// The event that caused this one, for derived events.
    pub fn causation_id(&self) -> Option<EventId> {
        match self {
            Self::DailyGoalAchieved(e) => Some(e.source_event_id),
            _ => None,
        }
    }

    fn inner(&self) -> &dyn DomainEvent {
        match self {
            Self::JourneyCreated(e) => e,
            Self::JourneyUpdated(e) => e,
            Self::JourneyDeleted(e) => e,
            Self::UserStatusChanged(e) => e,
            Self::DailyGoalAchieved(e) => e,
        }
    }
}

fn parse<T: DeserializeOwned>(event_type: &str, payload: &JsonValue) -> Result<T, DecodeError> {
    T::deserialize(payload).map_err(|e| DecodeError::malformed(event_type, e))
}

impl DomainEvent for OutboxEvent {
    fn event_type(&self) -> &'static str {
        self.inner().event_type()
    }

    fn aggregate_id(&self) -> String {
        self.inner().aggregate_id()
    }

    fn aggregate_type(&self) -> &'static str {
        self.inner().aggregate_type()
    }

    fn occurred_at(&self) -> Timestamp {
        self.inner().occurred_at()
    }

    fn event_id(&self) -> EventId {
        self.inner().event_id()
    }
}

impl From<JourneyEvent> for OutboxEvent {
    fn from(event: JourneyEvent) -> Self {
        match event {
            JourneyEvent::Created(e) => Self::JourneyCreated(e),
            JourneyEvent::Updated(e) => Self::JourneyUpdated(e),
            JourneyEvent::Deleted(e) => Self::JourneyDeleted(e),
        }
    }
}

impl From<UserStatusChanged> for OutboxEvent {
    fn from(event: UserStatusChanged) -> Self {
        Self::UserStatusChanged(event)
    }
}

impl From<DailyGoalAchieved> for OutboxEvent {
    fn from(event: DailyGoalAchieved) -> Self {
        Self::DailyGoalAchieved(event)
    }
}
