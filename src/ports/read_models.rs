//! Read-model ports owned by the statistics and reward projectors.
//!
//! Both stores deduplicate inside the same atomic update that changes the
//! row, so two consumers handling the same event concurrently still count it
//! once.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::domain::foundation::{DistanceKm, DomainError, EventId, MonthPeriod, Timestamp, UserId};
use crate::domain::reward::{DailyGoal, DailyGoalAchieved, DailyRewardProgress};
use crate::domain::statistics::{AdjustmentOutcome, MonthlyAdjustment, MonthlyDistance};

/// Store for per-user monthly distance totals.
#[async_trait]
pub trait MonthlyDistanceRepository: Send + Sync {
    /// Apply one adjustment exactly once per `adjustment.key`.
    ///
    /// Missing rows are handled per `adjustment.on_missing`. Totals are
    /// clamped at zero.
    async fn apply(
        &self,
        adjustment: &MonthlyAdjustment,
        now: Timestamp,
    ) -> Result<AdjustmentOutcome, DomainError>;

    async fn find(
        &self,
        user_id: &UserId,
        period: MonthPeriod,
    ) -> Result<Option<MonthlyDistance>, DomainError>;

    /// All months for a user, oldest first.
    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<MonthlyDistance>, DomainError>;
}

/// A distance credited to one user's day by one source event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewardContribution {
    pub source_event_id: EventId,
    pub user_id: UserId,
    pub date: NaiveDate,
    pub distance: DistanceKm,
}

/// Result of crediting a contribution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContributionOutcome {
    /// The source event was credited before; nothing changed.
    Duplicate,
    /// The contribution was added. `achieved` is set on the crossing.
    Applied {
        progress: DailyRewardProgress,
        achieved: Option<DailyGoalAchieved>,
    },
}

/// Store for per-user daily reward progress.
#[async_trait]
pub trait DailyRewardRepository: Send + Sync {
    /// Credit a contribution atomically.
    ///
    /// In one transaction: check the dedup key, lazily create the day's row,
    /// add the distance, compare pre-add and post-add totals against `goal`,
    /// and on a crossing append `DailyGoalAchieved` to the reward outbox.
    async fn apply_contribution(
        &self,
        contribution: &RewardContribution,
        goal: &DailyGoal,
        now: Timestamp,
    ) -> Result<ContributionOutcome, DomainError>;

    async fn find(
        &self,
        user_id: &UserId,
        date: NaiveDate,
    ) -> Result<Option<DailyRewardProgress>, DomainError>;
}
