//! Journey command handlers.

mod create_journey;
mod delete_journey;
mod relationships;
mod update_journey;

pub use create_journey::{CreateJourneyCommand, CreateJourneyHandler, CreateJourneyResult};
pub use delete_journey::{DeleteJourneyCommand, DeleteJourneyHandler};
pub use relationships::{FavoriteJourneyHandler, ShareJourneyCommand, ShareJourneyHandler};
pub use update_journey::{UpdateJourneyCommand, UpdateJourneyHandler, UpdateJourneyResult};

use crate::domain::foundation::{DomainError, ErrorCode, JourneyId};
use crate::domain::journey::Journey;
use crate::ports::JourneyRepository;

async fn load_journey(
    repository: &dyn JourneyRepository,
    journey_id: &JourneyId,
) -> Result<Journey, DomainError> {
    repository.find_by_id(journey_id).await?.ok_or_else(|| {
        DomainError::new(
            ErrorCode::JourneyNotFound,
            format!("Journey {} not found", journey_id),
        )
    })
}

#[cfg(test)]
pub(crate) mod test_support {
    use async_trait::async_trait;
    use std::sync::Arc;

    use crate::domain::foundation::{DistanceKm, DomainError, JourneyId, Timestamp, UserId};
    use crate::domain::journey::{Journey, JourneyDetails, Location, TransportType};
    use crate::domain::outbox::OutboxEvent;
    use crate::ports::JourneyRepository;

    /// Always reads the same snapshot but writes through to `inner`, so a
    /// handler behaves as if it loaded before every other writer committed.
    pub struct SnapshotReads {
        pub inner: Arc<dyn JourneyRepository>,
        pub snapshot: Journey,
    }

    #[async_trait]
    impl JourneyRepository for SnapshotReads {
        async fn save(&self, journey: &Journey, events: &[OutboxEvent]) -> Result<(), DomainError> {
            self.inner.save(journey, events).await
        }

        async fn delete(&self, journey: &Journey, events: &[OutboxEvent]) -> Result<(), DomainError> {
            self.inner.delete(journey, events).await
        }

        async fn find_by_id(&self, id: &JourneyId) -> Result<Option<Journey>, DomainError> {
            Ok((self.snapshot.id() == *id).then(|| self.snapshot.clone()))
        }
    }

    pub fn user(id: &str) -> UserId {
        UserId::new(id).unwrap()
    }

    pub fn details(start: &str, km: f64) -> JourneyDetails {
        let start = Timestamp::parse_rfc3339(start).unwrap();
        JourneyDetails {
            start_location: Location::new("Riverside").unwrap(),
            start_time: start,
            arrival_location: Location::new("Old Town").unwrap(),
            arrival_time: start.plus_secs(3600),
            transport_type: TransportType::Train,
            distance_km: DistanceKm::try_from_km(km).unwrap(),
        }
    }
}
