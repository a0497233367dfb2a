//! Monthly distance read model and the adjustment planner that feeds it.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::{DistanceDelta, DistanceKm, EventId, MonthPeriod, Timestamp, UserId};
use crate::domain::integration::{JourneyCreatedV1, JourneyDeletedV1, JourneyUpdatedV1};

/// Running distance total for one user in one UTC calendar month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyDistance {
    pub user_id: UserId,
    pub period: MonthPeriod,
    pub total: DistanceKm,
    pub updated_at: Timestamp,
}

impl MonthlyDistance {
    /// A fresh row holding `total`.
    pub fn new(user_id: UserId, period: MonthPeriod, total: DistanceKm, now: Timestamp) -> Self {
        Self {
            user_id,
            period,
            total,
            updated_at: now,
        }
    }

    /// Applies a delta, clamping at zero. Returns whether clamping happened.
    pub fn apply(&mut self, delta: DistanceDelta, now: Timestamp) -> bool {
        let (total, clamped) = self.total.apply(delta);
        self.total = total;
        self.updated_at = now;
        clamped
    }
}

/// Which part of a source event an adjustment implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentLeg {
    Add,
    Delta,
    RemoveOld,
    AddNew,
    Remove,
}

impl AdjustmentLeg {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdjustmentLeg::Add => "add",
            AdjustmentLeg::Delta => "delta",
            AdjustmentLeg::RemoveOld => "remove_old",
            AdjustmentLeg::AddNew => "add_new",
            AdjustmentLeg::Remove => "remove",
        }
    }
}

/// Dedup key for one leg: the source event id plus the leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AdjustmentKey {
    pub event_id: EventId,
    pub leg: AdjustmentLeg,
}

impl fmt::Display for AdjustmentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.event_id, self.leg.as_str())
    }
}

/// What to do when the target row does not exist yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnMissing {
    /// Create the row holding exactly this total.
    CreateWith(DistanceKm),
    /// Leave the read model untouched.
    Skip,
}

/// One idempotent change to one (user, month) row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthlyAdjustment {
    pub key: AdjustmentKey,
    pub user_id: UserId,
    pub period: MonthPeriod,
    pub delta: DistanceDelta,
    pub on_missing: OnMissing,
}

/// Result of applying an adjustment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdjustmentOutcome {
    /// The row changed (or was created); `clamped` is true if the total hit zero.
    Applied { total: DistanceKm, clamped: bool },
    /// This key was applied before.
    Duplicate,
    /// The row was missing and the policy was to skip.
    SkippedMissing,
}

/// Plans the adjustments for a created journey.
pub fn plan_created(event_id: EventId, e: &JourneyCreatedV1) -> Vec<MonthlyAdjustment> {
    vec![MonthlyAdjustment {
        key: AdjustmentKey {
            event_id,
            leg: AdjustmentLeg::Add,
        },
        user_id: e.user_id.clone(),
        period: e.start_time.month_period(),
        delta: DistanceDelta::add(e.distance_km),
        on_missing: OnMissing::CreateWith(e.distance_km),
    }]
}

/// Plans the adjustments for an updated journey.
///
/// The prior period and distance come from the event itself. A journey that
/// stays in its month yields one delta leg; one that moves yields a removal
/// from the old month and an addition to the new one.
pub fn plan_updated(event_id: EventId, e: &JourneyUpdatedV1) -> Vec<MonthlyAdjustment> {
    let old_period = e.old_start_time.month_period();
    let new_period = e.start_time.month_period();

    if old_period == new_period {
        let delta = DistanceDelta::between(e.old_distance_km, e.distance_km);
        if delta.is_zero() {
            return Vec::new();
        }
        return vec![MonthlyAdjustment {
            key: AdjustmentKey {
                event_id,
                leg: AdjustmentLeg::Delta,
            },
            user_id: e.user_id.clone(),
            period: new_period,
            delta,
            on_missing: OnMissing::CreateWith(e.distance_km),
        }];
    }

    vec![
        MonthlyAdjustment {
            key: AdjustmentKey {
                event_id,
                leg: AdjustmentLeg::RemoveOld,
            },
            user_id: e.user_id.clone(),
            period: old_period,
            delta: DistanceDelta::remove(e.old_distance_km),
            on_missing: OnMissing::Skip,
        },
        MonthlyAdjustment {
            key: AdjustmentKey {
                event_id,
                leg: AdjustmentLeg::AddNew,
            },
            user_id: e.user_id.clone(),
            period: new_period,
            delta: DistanceDelta::add(e.distance_km),
            on_missing: OnMissing::CreateWith(e.distance_km),
        },
    ]
}

/// Plans the adjustments for a deleted journey.
pub fn plan_deleted(event_id: EventId, e: &JourneyDeletedV1) -> Vec<MonthlyAdjustment> {
    vec![MonthlyAdjustment {
        key: AdjustmentKey {
            event_id,
            leg: AdjustmentLeg::Remove,
        },
        user_id: e.user_id.clone(),
        period: e.start_time.month_period(),
        delta: DistanceDelta::remove(e.distance_km),
        on_missing: OnMissing::Skip,
    }]
}
