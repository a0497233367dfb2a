//! In-memory read-model stores.
//!
//! Each store keeps its rows and its dedup ledger behind one lock, so the
//! check, the change and the ledger entry happen as a single step.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;

use super::InMemoryOutbox;
use crate::domain::foundation::{DomainError, EventId, MonthPeriod, Timestamp, UserId};
use crate::domain::outbox::OutboxEvent;
use crate::domain::reward::{DailyGoal, DailyRewardProgress};
use crate::domain::statistics::{
    AdjustmentKey, AdjustmentOutcome, MonthlyAdjustment, MonthlyDistance, OnMissing,
};
use crate::ports::{
    ContributionOutcome, DailyRewardRepository, MonthlyDistanceRepository, OutboxRecord,
    RewardContribution,
};

#[derive(Default)]
struct MonthlyState {
    rows: BTreeMap<(UserId, MonthPeriod), MonthlyDistance>,
    applied: HashSet<AdjustmentKey>,
}

/// Monthly totals keyed by (user, period).
#[derive(Default)]
pub struct InMemoryMonthlyDistanceRepository {
    state: Mutex<MonthlyState>,
}

impl InMemoryMonthlyDistanceRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MonthlyDistanceRepository for InMemoryMonthlyDistanceRepository {
    async fn apply(
        &self,
        adjustment: &MonthlyAdjustment,
        now: Timestamp,
    ) -> Result<AdjustmentOutcome, DomainError> {
        let mut state = self.state.lock().await;
        if state.applied.contains(&adjustment.key) {
            return Ok(AdjustmentOutcome::Duplicate);
        }

        let row_key = (adjustment.user_id.clone(), adjustment.period);
        let outcome = match state.rows.get_mut(&row_key) {
            Some(row) => {
                let clamped = row.apply(adjustment.delta, now);
                AdjustmentOutcome::Applied {
                    total: row.total,
                    clamped,
                }
            }
            None => match adjustment.on_missing {
                OnMissing::CreateWith(total) => {
                    let row = MonthlyDistance::new(
                        adjustment.user_id.clone(),
                        adjustment.period,
                        total,
                        now,
                    );
                    state.rows.insert(row_key, row);
                    AdjustmentOutcome::Applied {
                        total,
                        clamped: false,
                    }
                }
                OnMissing::Skip => AdjustmentOutcome::SkippedMissing,
            },
        };

        state.applied.insert(adjustment.key);
        Ok(outcome)
    }

    async fn find(
        &self,
        user_id: &UserId,
        period: MonthPeriod,
    ) -> Result<Option<MonthlyDistance>, DomainError> {
        Ok(self
            .state
            .lock()
            .await
            .rows
            .get(&(user_id.clone(), period))
            .cloned())
    }

    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<MonthlyDistance>, DomainError> {
        Ok(self
            .state
            .lock()
            .await
            .rows
            .values()
            .filter(|r| &r.user_id == user_id)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
struct RewardState {
    rows: HashMap<(UserId, NaiveDate), DailyRewardProgress>,
    credited: HashSet<EventId>,
}

/// Daily progress keyed by (user, date), writing goal events to `outbox`.
pub struct InMemoryDailyRewardRepository {
    state: Mutex<RewardState>,
    outbox: Arc<InMemoryOutbox>,
}

impl InMemoryDailyRewardRepository {
    pub fn new(outbox: Arc<InMemoryOutbox>) -> Self {
        Self {
            state: Mutex::new(RewardState::default()),
            outbox,
        }
    }
}

#[async_trait]
impl DailyRewardRepository for InMemoryDailyRewardRepository {
    async fn apply_contribution(
        &self,
        contribution: &RewardContribution,
        goal: &DailyGoal,
        now: Timestamp,
    ) -> Result<ContributionOutcome, DomainError> {
        let mut state = self.state.lock().await;
        if state.credited.contains(&contribution.source_event_id) {
            return Ok(ContributionOutcome::Duplicate);
        }

        let key = (contribution.user_id.clone(), contribution.date);
        let current = state.rows.get(&key).cloned().unwrap_or_else(|| {
            DailyRewardProgress::start(contribution.user_id.clone(), contribution.date, now)
        });
        let (progress, achieved) = current.add_contribution(
            contribution.distance,
            goal,
            contribution.source_event_id,
            now,
        );

        if let Some(event) = &achieved {
            let record = OutboxRecord::from_event(&OutboxEvent::from(event.clone()))?;
            self.outbox.append(vec![record]).await;
        }

        state.rows.insert(key, progress.clone());
        state.credited.insert(contribution.source_event_id);

        Ok(ContributionOutcome::Applied { progress, achieved })
    }

    async fn find(
        &self,
        user_id: &UserId,
        date: NaiveDate,
    ) -> Result<Option<DailyRewardProgress>, DomainError> {
        Ok(self
            .state
            .lock()
            .await
            .rows
            .get(&(user_id.clone(), date))
            .cloned())
    }
}
