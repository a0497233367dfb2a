//! DeleteJourneyHandler - Removes a journey and records what was removed.

use std::sync::Arc;

use crate::domain::foundation::{DomainError, JourneyId, Timestamp, UserId};
use crate::domain::outbox::OutboxEvent;
use crate::ports::JourneyRepository;

use super::load_journey;

#[derive(Debug, Clone)]
pub struct DeleteJourneyCommand {
    pub journey_id: JourneyId,
    pub acting_user: UserId,
}

pub struct DeleteJourneyHandler {
    repository: Arc<dyn JourneyRepository>,
}

impl DeleteJourneyHandler {
    pub fn new(repository: Arc<dyn JourneyRepository>) -> Self {
        Self { repository }
    }

    pub async fn handle(&self, cmd: DeleteJourneyCommand) -> Result<(), DomainError> {
        let journey = load_journey(self.repository.as_ref(), &cmd.journey_id).await?;
        let events: Vec<OutboxEvent> = journey
            .delete(&cmd.acting_user, Timestamp::now())?
            .into_iter()
            .map(OutboxEvent::from)
            .collect();

        self.repository.delete(&journey, &events).await?;

        tracing::debug!(journey_id = %cmd.journey_id, "Journey deleted");
        Ok(())
    }
}
