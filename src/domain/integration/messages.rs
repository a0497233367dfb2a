//! Versioned wire payloads.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{DistanceKm, JourneyId, Timestamp, UserId};
use crate::domain::journey::{JourneyCreated, JourneyDeleted, JourneyUpdated, Location, TransportType};
use crate::domain::reward::DailyGoalAchieved;
use crate::domain::user::{UserStatus, UserStatusChanged};

/// `journey.created.v1`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JourneyCreatedV1 {
    pub journey_id: JourneyId,
    pub user_id: UserId,
    pub start_location: Location,
    pub start_time: Timestamp,
    pub arrival_location: Location,
    pub arrival_time: Timestamp,
    pub transport_type: TransportType,
    pub distance_km: DistanceKm,
    pub occurred_on_utc: Timestamp,
}

impl From<&JourneyCreated> for JourneyCreatedV1 {
    fn from(e: &JourneyCreated) -> Self {
        Self {
            journey_id: e.journey_id,
            user_id: e.user_id.clone(),
            start_location: e.start_location.clone(),
            start_time: e.start_time,
            arrival_location: e.arrival_location.clone(),
            arrival_time: e.arrival_time,
            transport_type: e.transport_type,
            distance_km: e.distance_km,
            occurred_on_utc: e.occurred_at,
        }
    }
}

/// `journey.updated.v1`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JourneyUpdatedV1 {
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
    pub favoriting_user_ids: Vec<UserId>,
    #[serde(default)]
    pub shared_with_user_ids: Vec<UserId>,
    pub occurred_on_utc: Timestamp,
}

impl JourneyUpdatedV1 {
    /// Builds the wire event with the audience resolved at relay time.
    pub fn from_domain(
        e: &JourneyUpdated,
        favoriting_user_ids: Vec<UserId>,
        shared_with_user_ids: Vec<UserId>,
    ) -> Self {
        Self {
            journey_id: e.journey_id,
            user_id: e.user_id.clone(),
            start_location: e.start_location.clone(),
            start_time: e.start_time,
            arrival_location: e.arrival_location.clone(),
            arrival_time: e.arrival_time,
            transport_type: e.transport_type,
            distance_km: e.distance_km,
            old_distance_km: e.old_distance_km,
            old_start_time: e.old_start_time,
            favoriting_user_ids,
            shared_with_user_ids,
            occurred_on_utc: e.occurred_at,
        }
    }
}

/// `journey.deleted.v1`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JourneyDeletedV1 {
    pub journey_id: JourneyId,
    pub user_id: UserId,
    pub start_location: Location,
    pub start_time: Timestamp,
    pub arrival_location: Location,
    pub distance_km: DistanceKm,
    pub favoriting_user_ids: Vec<UserId>,
    #[serde(default)]
    pub shared_with_user_ids: Vec<UserId>,
    pub occurred_on_utc: Timestamp,
}

impl JourneyDeletedV1 {
    /// Builds the wire event with the audience resolved at relay time.
    pub fn from_domain(
        e: &JourneyDeleted,
        favoriting_user_ids: Vec<UserId>,
        shared_with_user_ids: Vec<UserId>,
    ) -> Self {
        Self {
            journey_id: e.journey_id,
            user_id: e.user_id.clone(),
            start_location: e.start_location.clone(),
            start_time: e.start_time,
            arrival_location: e.arrival_location.clone(),
            distance_km: e.distance_km,
            favoriting_user_ids,
            shared_with_user_ids,
            occurred_on_utc: e.occurred_at,
        }
    }
}

/// `reward.daily_goal_achieved.v1`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyGoalAchievedV1 {
    pub user_id: UserId,
    pub date: NaiveDate,
    pub total_distance_km: DistanceKm,
    pub goal_distance_km: DistanceKm,
    pub points: u32,
    pub occurred_on_utc: Timestamp,
}

impl From<&DailyGoalAchieved> for DailyGoalAchievedV1 {
    fn from(e: &DailyGoalAchieved) -> Self {
        Self {
            user_id: e.user_id.clone(),
            date: e.date,
            total_distance_km: e.total_distance_km,
            goal_distance_km: e.goal_distance_km,
            points: e.points,
            occurred_on_utc: e.occurred_at,
        }
    }
}

/// `user.status_changed.v1`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStatusChangedV1 {
    pub user_id: UserId,
    pub previous_status: UserStatus,
    pub new_status: UserStatus,
    pub changed_by_user_id: UserId,
    pub occurred_on_utc: Timestamp,
}

impl From<&UserStatusChanged> for UserStatusChangedV1 {
    fn from(e: &UserStatusChanged) -> Self {
        Self {
            user_id: e.user_id.clone(),
            previous_status: e.previous_status,
            new_status: e.new_status,
            changed_by_user_id: e.changed_by_user_id.clone(),
            occurred_on_utc: e.occurred_at,
        }
    }
}
