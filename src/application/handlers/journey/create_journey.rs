//! CreateJourneyHandler - Records a new journey.

use std::sync::Arc;

use crate::domain::foundation::{DomainError, JourneyId, Timestamp, UserId};
use crate::domain::journey::{Journey, JourneyDetails};
use crate::domain::outbox::OutboxEvent;
use crate::ports::JourneyRepository;

/// Command to record a journey.
#[derive(Debug, Clone)]
pub struct CreateJourneyCommand {
    pub user_id: UserId,
    pub details: JourneyDetails,
}

/// Result of successful journey creation.
#[derive(Debug, Clone)]
pub struct CreateJourneyResult {
    pub journey: Journey,
    pub events: Vec<OutboxEvent>,
}

pub struct CreateJourneyHandler {
    repository: Arc<dyn JourneyRepository>,
}

impl CreateJourneyHandler {
    pub fn new(repository: Arc<dyn JourneyRepository>) -> Self {
        Self { repository }
    }

    pub async fn handle(&self, cmd: CreateJourneyCommand) -> Result<CreateJourneyResult, DomainError> {
        let (journey, events) =
            Journey::create(JourneyId::new(), cmd.user_id, cmd.details, Timestamp::now())?;
        let events: Vec<OutboxEvent> = events.into_iter().map(OutboxEvent::from).collect();

        self.repository.save(&journey, &events).await?;

        tracing::debug!(journey_id = %journey.id(), user_id = %journey.user_id(), "Journey created");
        Ok(CreateJourneyResult { journey, events })
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{details, user};
    use super::*;
    use crate::adapters::memory::{InMemoryJourneyRepository, InMemoryOutbox};
    use crate::domain::foundation::{DistanceKm, ErrorCode};

    fn setup() -> (Arc<InMemoryOutbox>, CreateJourneyHandler, Arc<InMemoryJourneyRepository>) {
        let outbox = Arc::new(InMemoryOutbox::new());
        let repository = Arc::new(InMemoryJourneyRepository::new(outbox.clone()));
        (outbox, CreateJourneyHandler::new(repository.clone()), repository)
    }

    #[tokio::test]
    async fn persists_journey_and_outbox_row() {
        let (outbox, handler, repository) = setup();

        let result = handler
            .handle(CreateJourneyCommand {
                user_id: user("alice"),
                details: details("2024-01-15T08:00:00Z", 15.0),
            })
            .await
            .unwrap();

        let stored = repository.find_by_id(&result.journey.id()).await.unwrap();
        assert_eq!(stored, Some(result.journey.clone()));

        let rows = outbox.rows().await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].event_type, "journey.created");
        assert!(rows[0].processed_at.is_none());
    }

    #[tokio::test]
    async fn invalid_details_write_nothing() {
        let (outbox, handler, _) = setup();
        let mut bad = details("2024-01-15T08:00:00Z", 15.0);
        bad.arrival_time = bad.start_time;

        let err = handler
            .handle(CreateJourneyCommand {
                user_id: user("alice"),
                details: bad,
            })
            .await
            .unwrap_err();

        assert_eq!(err.code, ErrorCode::ValidationFailed);
        assert!(outbox.rows().await.is_empty());
    }

    #[tokio::test]
    async fn zero_distance_is_rejected() {
        let (outbox, handler, _) = setup();
        let mut bad = details("2024-01-15T08:00:00Z", 1.0);
        bad.distance_km = DistanceKm::ZERO;

        let result = handler
            .handle(CreateJourneyCommand {
                user_id: user("alice"),
                details: bad,
            })
            .await;

        assert!(result.is_err());
        assert!(outbox.rows().await.is_empty());
    }
}
