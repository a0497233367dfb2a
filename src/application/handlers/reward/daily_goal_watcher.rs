//! DailyGoalWatcher - Credits created journeys to the rider's day and
//! detects the goal crossing.
//!
//! The day is the UTC date of the journey's start. Crossing detection and the
//! resulting `DailyGoalAchieved` outbox row happen inside the store's atomic
//! update, keyed by the source event id.

use async_trait::async_trait;
use std::sync::Arc;

use crate::domain::foundation::{DomainError, EventEnvelope, EventId, Timestamp};
use crate::domain::integration::{IntegrationEvent, JourneyCreatedV1};
use crate::domain::reward::DailyGoal;
use crate::ports::{ContributionOutcome, DailyRewardRepository, EventHandler, RewardContribution};

pub struct DailyGoalWatcher {
    repository: Arc<dyn DailyRewardRepository>,
    goal: DailyGoal,
}

impl DailyGoalWatcher {
    pub fn new(repository: Arc<dyn DailyRewardRepository>, goal: DailyGoal) -> Self {
        Self { repository, goal }
    }

    pub fn goal(&self) -> &DailyGoal {
        &self.goal
    }

    /// Credits one created journey.
    pub async fn credit(
        &self,
        event_id: EventId,
        event: &JourneyCreatedV1,
    ) -> Result<ContributionOutcome, DomainError> {
        let contribution = RewardContribution {
            source_event_id: event_id,
            user_id: event.user_id.clone(),
            date: event.start_time.utc_date(),
            distance: event.distance_km,
        };

        let outcome = self
            .repository
            .apply_contribution(&contribution, &self.goal, Timestamp::now())
            .await?;

        match &outcome {
            ContributionOutcome::Duplicate => tracing::debug!(
                event_id = %event_id,
                "Contribution already credited"
            ),
            ContributionOutcome::Applied {
                progress,
                achieved: Some(_),
            } => tracing::info!(
                event_id = %event_id,
                user_id = %contribution.user_id,
                date = %contribution.date,
                total = %progress.total_distance(),
                points = progress.points(),
                "Daily goal achieved"
            ),
            ContributionOutcome::Applied { progress, .. } => tracing::debug!(
                event_id = %event_id,
                user_id = %contribution.user_id,
                date = %contribution.date,
                total = %progress.total_distance(),
                "Daily distance credited"
            ),
        }

        Ok(outcome)
    }
}

#[async_trait]
impl EventHandler for DailyGoalWatcher {
    async fn handle(&self, envelope: EventEnvelope) -> Result<(), DomainError> {
        match IntegrationEvent::decode(&envelope)? {
            IntegrationEvent::JourneyCreated(event) => {
                self.credit(envelope.event_id, &event).await?;
            }
            IntegrationEvent::JourneyUpdated(_)
            | IntegrationEvent::JourneyDeleted(_)
            | IntegrationEvent::DailyGoalAchieved(_)
            | IntegrationEvent::UserStatusChanged(_) => {}
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "DailyGoalWatcher"
    }
}
