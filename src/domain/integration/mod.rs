//! Integration events - the wire contract between services.
//!
//! Each domain event kind maps to exactly one integration kind. Payloads use
//! camelCase JSON and travel inside an [`EventEnvelope`] whose `event_id` is
//! the id of the source domain event, so redeliveries keep the same id.

mod messages;

pub use messages::{
    DailyGoalAchievedV1, JourneyCreatedV1, JourneyDeletedV1, JourneyUpdatedV1,
    UserStatusChangedV1,
};

use serde::de::DeserializeOwned;

use crate::domain::foundation::{DecodeError, EventEnvelope, EventId, Timestamp};

/// Wire type tags.
pub mod event_types {
    pub const JOURNEY_CREATED: &str = "journey.created.v1";
    pub const JOURNEY_UPDATED: &str = "journey.updated.v1";
    pub const JOURNEY_DELETED: &str = "journey.deleted.v1";
    pub const DAILY_GOAL_ACHIEVED: &str = "reward.daily_goal_achieved.v1";
    pub const USER_STATUS_CHANGED: &str = "user.status_changed.v1";

    /// Every tag a consumer may receive.
    pub const ALL: [&str; 5] = [
        JOURNEY_CREATED,
        JOURNEY_UPDATED,
        JOURNEY_DELETED,
        DAILY_GOAL_ACHIEVED,
        USER_STATUS_CHANGED,
    ];
}

/// The closed set of events published to the broker.
#[derive(Debug, Clone, PartialEq)]
pub enum IntegrationEvent {
    JourneyCreated(JourneyCreatedV1),
    JourneyUpdated(JourneyUpdatedV1),
    JourneyDeleted(JourneyDeletedV1),
    DailyGoalAchieved(DailyGoalAchievedV1),
    UserStatusChanged(UserStatusChangedV1),
}

impl IntegrationEvent {
    /// Wire type tag.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::JourneyCreated(_) => event_types::JOURNEY_CREATED,
            Self::JourneyUpdated(_) => event_types::JOURNEY_UPDATED,
            Self::JourneyDeleted(_) => event_types::JOURNEY_DELETED,
            Self::DailyGoalAchieved(_) => event_types::DAILY_GOAL_ACHIEVED,
            Self::UserStatusChanged(_) => event_types::USER_STATUS_CHANGED,
        }
    }

    /// Identity of the entity the event is about.
    pub fn aggregate_id(&self) -> String {
        match self {
            Self::JourneyCreated(e) => e.journey_id.to_string(),
            Self::JourneyUpdated(e) => e.journey_id.to_string(),
            Self::JourneyDeleted(e) => e.journey_id.to_string(),
            Self::DailyGoalAchieved(e) => e.user_id.to_string(),
            Self::UserStatusChanged(e) => e.user_id.to_string(),
        }
    }

    pub fn aggregate_type(&self) -> &'static str {
        match self {
            Self::JourneyCreated(_) | Self::JourneyUpdated(_) | Self::JourneyDeleted(_) => {
                "Journey"
            }
            Self::DailyGoalAchieved(_) => "DailyRewardProgress",
            Self::UserStatusChanged(_) => "UserAccount",
        }
    }

    pub fn occurred_on_utc(&self) -> Timestamp {
        match self {
            Self::JourneyCreated(e) => e.occurred_on_utc,
            Self::JourneyUpdated(e) => e.occurred_on_utc,
            Self::JourneyDeleted(e) => e.occurred_on_utc,
            Self::DailyGoalAchieved(e) => e.occurred_on_utc,
            Self::UserStatusChanged(e) => e.occurred_on_utc,
        }
    }

    /// Wraps the event for publishing.
    pub fn to_envelope(&self, event_id: EventId) -> Result<EventEnvelope, serde_json::Error> {
        let payload = match self {
            Self::JourneyCreated(e) => serde_json::to_value(e)?,
            Self::JourneyUpdated(e) => serde_json::to_value(e)?,
            Self::JourneyDeleted(e) => serde_json::to_value(e)?,
            Self::DailyGoalAchieved(e) => serde_json::to_value(e)?,
            Self::UserStatusChanged(e) => serde_json::to_value(e)?,
        };
        Ok(EventEnvelope::new(
            event_id,
            self.event_type(),
            self.aggregate_id(),
            self.aggregate_type(),
            self.occurred_on_utc(),
            payload,
        ))
    }

    /// Reads an event back out of a received envelope.
    ///
    /// # Errors
    ///
    /// - `UnknownEventType` for tags outside [`event_types::ALL`]
    /// - `Malformed` if the payload does not match the tag's shape
    pub fn decode(envelope: &EventEnvelope) -> Result<Self, DecodeError> {
        match envelope.event_type.as_str() {
            event_types::JOURNEY_CREATED => parse(envelope).map(Self::JourneyCreated),
            event_types::JOURNEY_UPDATED => parse(envelope).map(Self::JourneyUpdated),
            event_types::JOURNEY_DELETED => parse(envelope).map(Self::JourneyDeleted),
            event_types::DAILY_GOAL_ACHIEVED => parse(envelope).map(Self::DailyGoalAchieved),
            event_types::USER_STATUS_CHANGED => parse(envelope).map(Self::UserStatusChanged),
            other => Err(DecodeError::UnknownEventType(other.to_string())),
        }
    }
}

fn parse<T: DeserializeOwned>(envelope: &EventEnvelope) -> Result<T, DecodeError> {
    T::deserialize(&envelope.payload)
        .map_err(|e| DecodeError::malformed(envelope.event_type.clone(), e))
}
