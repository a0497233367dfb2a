//! UpdateJourneyHandler - Replaces a journey's details.

use std::sync::Arc;

use crate::domain::foundation::{DomainError, JourneyId, Timestamp, UserId};
use crate::domain::journey::{Journey, JourneyDetails};
use crate::domain::outbox::OutboxEvent;
use crate::ports::JourneyRepository;

use super::load_journey;

#[derive(Debug, Clone)]
pub struct UpdateJourneyCommand {
    pub journey_id: JourneyId,
    pub acting_user: UserId,
    pub details: JourneyDetails,
}

#[derive(Debug, Clone)]
pub struct UpdateJourneyResult {
    pub journey: Journey,
    /// False when the details were identical and nothing was written.
    pub changed: bool,
}

pub struct UpdateJourneyHandler {
    repository: Arc<dyn JourneyRepository>,
}

impl UpdateJourneyHandler {
    pub fn new(repository: Arc<dyn JourneyRepository>) -> Self {
        Self { repository }
    }

    pub async fn handle(&self, cmd: UpdateJourneyCommand) -> Result<UpdateJourneyResult, DomainError> {
        let current = load_journey(self.repository.as_ref(), &cmd.journey_id).await?;
        let (journey, events) = current.update(&cmd.acting_user, cmd.details, Timestamp::now())?;

        if events.is_empty() {
            return Ok(UpdateJourneyResult {
                journey,
                changed: false,
            });
        }

        let events: Vec<OutboxEvent> = events.into_iter().map(OutboxEvent::from).collect();
        self.repository.save(&journey, &events).await?;

        tracing::debug!(journey_id = %journey.id(), "Journey updated");
        Ok(UpdateJourneyResult {
            journey,
            changed: true,
        })
    }
}
