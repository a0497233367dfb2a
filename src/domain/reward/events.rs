//! Reward domain events.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::foundation::{domain_event, DistanceKm, EventId, Timestamp, UserId};

/// Published once per user and day when the daily goal is first reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyGoalAchieved {
    pub event_id: EventId,
    pub user_id: UserId,
    pub date: NaiveDate,
    pub total_distance_km: DistanceKm,
    pub goal_distance_km: DistanceKm,
    pub points: u32,
    /// The journey event whose contribution crossed the goal.
    pub source_event_id: EventId,
    pub occurred_at: Timestamp,
}

domain_event!(
    DailyGoalAchieved,
    event_type = "reward.daily_goal_achieved",
    aggregate_id = user_id,
    aggregate_type = "DailyRewardProgress",
    occurred_at = occurred_at,
    event_id = event_id
);
