//! Journey domain events.
//!
//! Events produced by journey mutations:
//! - `JourneyCreated` - New journey recorded
//! - `JourneyUpdated` - Journey details changed (carries prior values)
//! - `JourneyDeleted` - Journey removed

use serde::{Deserialize, Serialize};

use super::{JourneyDetails, Location, TransportType};
use crate::domain::foundation::{domain_event, DistanceKm, EventId, JourneyId, Timestamp, UserId};

// ════════════════════════════════════════════════════════════════════════════
// JourneyCreated
// ════════════════════════════════════════════════════════════════════════════

/// Published when a journey is recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JourneyCreated {
    pub event_id: EventId,
    pub journey_id: JourneyId,
    pub user_id: UserId,
    pub start_location: Location,
    pub start_time: Timestamp,
    pub arrival_location: Location,
    pub arrival_time: Timestamp,
    pub transport_type: TransportType,
    pub distance_km: DistanceKm,
    pub occurred_at: Timestamp,
}

domain_event!(
    JourneyCreated,
    event_type = "journey.created",
    aggregate_id = journey_id,
    aggregate_type = "Journey",
    occurred_at = occurred_at,
    event_id = event_id
);

// ════════════════════════════════════════════════════════════════════════════
// JourneyUpdated
// ════════════════════════════════════════════════════════════════════════════

/// Published when a journey's details change.
///
/// `old_distance_km` and `old_start_time` are the values immediately before
/// this mutation. Projectors use them as the authoritative prior state rather
/// than anything they tracked themselves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JourneyUpdated {
    pub event_id: EventId,
    pub journey_id: JourneyId,
    pub user_id: UserId,
    pub start_location: Location,
    pub start_time: Timestamp,
    pub arrival_location: Location,
    pub arrival_time: Timestamp,
    pub transport_type: TransportType,
    pub distance_km: DistanceKm,
    pub old_distance_km: DistanceKm,
    pub old_start_time: Timestamp,
    pub occurred_at: Timestamp,
}

domain_event!(
    JourneyUpdated,
    event_type = "journey.updated",
    aggregate_id = journey_id,
    aggregate_type = "Journey",
    occurred_at = occurred_at,
    event_id = event_id
);

// ════════════════════════════════════════════════════════════════════════════
// JourneyDeleted
// ════════════════════════════════════════════════════════════════════════════

/// Published when a journey is deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JourneyDeleted {
    pub event_id: EventId,
    pub journey_id: JourneyId,
    pub user_id: UserId,
    pub start_location: Location,
    pub start_time: Timestamp,
    pub arrival_location: Location,
    pub distance_km: DistanceKm,
    pub occurred_at: Timestamp,
}

domain_event!(
    JourneyDeleted,
    event_type = "journey.deleted",
    aggregate_id = journey_id,
    aggregate_type = "Journey",
    occurred_at = occurred_at,
    event_id = event_id
);

/// Any event a journey mutation can produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JourneyEvent {
    Created(JourneyCreated),
    Updated(JourneyUpdated),
    Deleted(JourneyDeleted),
}

impl JourneyEvent {
    pub(super) fn created(
        journey_id: JourneyId,
        user_id: UserId,
        details: &JourneyDetails,
        occurred_at: Timestamp,
    ) -> Self {
        JourneyEvent::Created(JourneyCreated {
            event_id: EventId::new(),
            journey_id,
            user_id,
            start_location: details.start_location.clone(),
            start_time: details.start_time,
            arrival_location: details.arrival_location.clone(),
            arrival_time: details.arrival_time,
            transport_type: details.transport_type,
            distance_km: details.distance_km,
            occurred_at,
        })
    }

    pub(super) fn updated(
        journey_id: JourneyId,
        user_id: UserId,
        old: &JourneyDetails,
        new: &JourneyDetails,
        occurred_at: Timestamp,
    ) -> Self {
        JourneyEvent::Updated(JourneyUpdated {
            event_id: EventId::new(),
            journey_id,
            user_id,
            start_location: new.start_location.clone(),
            start_time: new.start_time,
            arrival_location: new.arrival_location.clone(),
            arrival_time: new.arrival_time,
            transport_type: new.transport_type,
            distance_km: new.distance_km,
            old_distance_km: old.distance_km,
            old_start_time: old.start_time,
            occurred_at,
        })
    }

    pub(super) fn deleted(
        journey_id: JourneyId,
        user_id: UserId,
        details: &JourneyDetails,
        occurred_at: Timestamp,
    ) -> Self {
        JourneyEvent::Deleted(JourneyDeleted {
            event_id: EventId::new(),
            journey_id,
            user_id,
            start_location: details.start_location.clone(),
            start_time: details.start_time,
            arrival_location: details.arrival_location.clone(),
            distance_km: details.distance_km,
            occurred_at,
        })
    }
}
