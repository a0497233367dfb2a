//! Statistics module - per-user monthly distance totals.

mod monthly;

pub use monthly::{
    plan_created, plan_deleted, plan_updated, AdjustmentKey, AdjustmentLeg, AdjustmentOutcome,
    MonthlyAdjustment, MonthlyDistance, OnMissing,
};
