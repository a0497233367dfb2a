//! MonthlyDistanceProjector - Keeps per-user monthly totals in step with
//! journey events.
//!
//! Each event is planned into one or two adjustments. Every adjustment is
//! deduplicated in the store by (event id, leg), so a redelivery after a
//! partial failure only applies the legs that did not land the first time.

use async_trait::async_trait;
use std::sync::Arc;

use crate::domain::foundation::{DomainError, EventEnvelope, EventId, Timestamp};
use crate::domain::integration::IntegrationEvent;
use crate::domain::statistics::{
    plan_created, plan_deleted, plan_updated, AdjustmentOutcome, MonthlyAdjustment,
};
use crate::ports::{EventHandler, MonthlyDistanceRepository};

pub struct MonthlyDistanceProjector {
    repository: Arc<dyn MonthlyDistanceRepository>,
}

impl MonthlyDistanceProjector {
    pub fn new(repository: Arc<dyn MonthlyDistanceRepository>) -> Self {
        Self { repository }
    }

    /// Applies one event. Events other than journey events yield no outcomes.
    pub async fn project(
        &self,
        event_id: EventId,
        event: &IntegrationEvent,
    ) -> Result<Vec<AdjustmentOutcome>, DomainError> {
        let plan = match event {
            IntegrationEvent::JourneyCreated(e) => plan_created(event_id, e),
            IntegrationEvent::JourneyUpdated(e) => plan_updated(event_id, e),
            IntegrationEvent::JourneyDeleted(e) => plan_deleted(event_id, e),
            IntegrationEvent::DailyGoalAchieved(_) | IntegrationEvent::UserStatusChanged(_) => {
                return Ok(Vec::new())
            }
        };

        let mut outcomes = Vec::with_capacity(plan.len());
        for adjustment in &plan {
            let outcome = self.repository.apply(adjustment, Timestamp::now()).await?;
            log_outcome(event_id, adjustment, &outcome);
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }
}

fn log_outcome(event_id: EventId, adjustment: &MonthlyAdjustment, outcome: &AdjustmentOutcome) {
    match outcome {
        AdjustmentOutcome::Applied { total, clamped: true } => tracing::warn!(
            event_id = %event_id,
            user_id = %adjustment.user_id,
            period = %adjustment.period,
            leg = adjustment.key.leg.as_str(),
            total = %total,
            "Monthly total would have gone negative, clamped to zero"
        ),
        AdjustmentOutcome::Applied { total, .. } => tracing::debug!(
            event_id = %event_id,
            user_id = %adjustment.user_id,
            period = %adjustment.period,
            leg = adjustment.key.leg.as_str(),
            total = %total,
            "Monthly total adjusted"
        ),
        AdjustmentOutcome::Duplicate => tracing::debug!(
            event_id = %event_id,
            leg = adjustment.key.leg.as_str(),
            "Adjustment already applied"
        ),
        AdjustmentOutcome::SkippedMissing => tracing::warn!(
            event_id = %event_id,
            user_id = %adjustment.user_id,
            period = %adjustment.period,
            leg = adjustment.key.leg.as_str(),
            "No monthly total to subtract from, skipped"
        ),
    }
}

#[async_trait]
impl EventHandler for MonthlyDistanceProjector {
    async fn handle(&self, envelope: EventEnvelope) -> Result<(), DomainError> {
        let event = IntegrationEvent::decode(&envelope)?;
        self.project(envelope.event_id, &event).await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "MonthlyDistanceProjector"
    }
}
