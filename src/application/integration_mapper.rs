//! RelationshipIntegrationMapper - Builds wire events at relay time.
//!
//! Updated and Deleted events carry the journey's current audience, read from
//! the relationship store when the row is relayed rather than when it was
//! written. Relationship rows outlive the journey, so a delete still sees them.

use async_trait::async_trait;
use std::sync::Arc;

use crate::domain::foundation::{DomainError, JourneyId, UserId};
use crate::domain::integration::{IntegrationEvent, JourneyDeletedV1, JourneyUpdatedV1};
use crate::domain::outbox::OutboxEvent;
use crate::ports::{IntegrationEventMapper, RelationshipRepository};

pub struct RelationshipIntegrationMapper {
    relationships: Arc<dyn RelationshipRepository>,
}

impl RelationshipIntegrationMapper {
    pub fn new(relationships: Arc<dyn RelationshipRepository>) -> Self {
        Self { relationships }
    }

    async fn audience(
        &self,
        journey_id: &JourneyId,
    ) -> Result<(Vec<UserId>, Vec<UserId>), DomainError> {
        futures::try_join!(
            self.relationships.favoriting_users(journey_id),
            self.relationships.shared_with_users(journey_id),
        )
    }
}

#[async_trait]
impl IntegrationEventMapper for RelationshipIntegrationMapper {
    async fn map(&self, event: &OutboxEvent) -> Result<IntegrationEvent, DomainError> {
        let mapped = match event {
            OutboxEvent::JourneyCreated(e) => IntegrationEvent::JourneyCreated(e.into()),
            OutboxEvent::JourneyUpdated(e) => {
                let (favoriting, shared_with) = self.audience(&e.journey_id).await?;
                IntegrationEvent::JourneyUpdated(JourneyUpdatedV1::from_domain(
                    e,
                    favoriting,
                    shared_with,
                ))
            }
            OutboxEvent::JourneyDeleted(e) => {
                let (favoriting, shared_with) = self.audience(&e.journey_id).await?;
                IntegrationEvent::JourneyDeleted(JourneyDeletedV1::from_domain(
                    e,
                    favoriting,
                    shared_with,
                ))
            }
            OutboxEvent::UserStatusChanged(e) => IntegrationEvent::UserStatusChanged(e.into()),
            OutboxEvent::DailyGoalAchieved(e) => IntegrationEvent::DailyGoalAchieved(e.into()),
        };
        Ok(mapped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryRelationshipRepository;
    use crate::domain::foundation::{DistanceKm, Timestamp};
    use crate::domain::journey::{Favorite, Journey, JourneyDetails, Location, Share, TransportType};
    use crate::domain::user::{UserAccount, UserStatus};

    fn user(id: &str) -> UserId {
        UserId::new(id).unwrap()
    }

    fn details(start: &str, km: f64) -> JourneyDetails {
        let start = Timestamp::parse_rfc3339(start).unwrap();
        JourneyDetails {
            start_location: Location::new("Home").unwrap(),
            start_time: start,
            arrival_location: Location::new("Office").unwrap(),
            arrival_time: start.plus_secs(2400),
            transport_type: TransportType::Cycling,
            distance_km: DistanceKm::try_from_km(km).unwrap(),
        }
    }

    async fn setup() -> (Arc<InMemoryRelationshipRepository>, RelationshipIntegrationMapper, Journey) {
        let now = Timestamp::parse_rfc3339("2024-03-01T08:00:00Z").unwrap();
        let (journey, _) = Journey::create(
            JourneyId::new(),
            user("owner"),
            details("2024-03-01T07:00:00Z", 12.0),
            now,
        )
        .unwrap();

        let relationships = Arc::new(InMemoryRelationshipRepository::new());
        relationships
            .add_favorite(&Favorite {
                journey_id: journey.id(),
                user_id: user("fan"),
                created_at: now,
            })
            .await
            .unwrap();
        relationships
            .add_share(&Share::new(journey.id(), user("friend"), user("owner"), now).unwrap())
            .await
            .unwrap();

        let mapper = RelationshipIntegrationMapper::new(relationships.clone());
        (relationships, mapper, journey)
    }

    #[tokio::test]
    async fn created_maps_without_audience() {
        let (_, mapper, _) = setup().await;
        let now = Timestamp::now();
        let (_, events) = Journey::create(
            JourneyId::new(),
            user("owner"),
            details("2024-03-02T07:00:00Z", 5.0),
            now,
        )
        .unwrap();
        let event = OutboxEvent::from(events.into_iter().next().unwrap());

        let mapped = mapper.map(&event).await.unwrap();
        assert!(matches!(mapped, IntegrationEvent::JourneyCreated(_)));
    }

    #[tokio::test]
    async fn updated_carries_favoriters_and_shares() {
        let (_, mapper, journey) = setup().await;
        let (_, events) = journey
            .update(&user("owner"), details("2024-03-01T07:00:00Z", 14.5), Timestamp::now())
            .unwrap();
        let event = OutboxEvent::from(events.into_iter().next().unwrap());

        let IntegrationEvent::JourneyUpdated(wire) = mapper.map(&event).await.unwrap() else {
            panic!("expected journey.updated.v1");
        };
        assert_eq!(wire.favoriting_user_ids, vec![user("fan")]);
        assert_eq!(wire.shared_with_user_ids, vec![user("friend")]);
        assert_eq!(wire.old_distance_km, DistanceKm::try_from_km(12.0).unwrap());
        assert_eq!(wire.distance_km, DistanceKm::try_from_km(14.5).unwrap());
    }

    #[tokio::test]
    async fn deleted_reads_audience_at_map_time() {
        let (relationships, mapper, journey) = setup().await;
        let events = journey.delete(&user("owner"), Timestamp::now()).unwrap();
        let event = OutboxEvent::from(events.into_iter().next().unwrap());
        relationships
            .remove_share(&journey.id(), &user("friend"))
            .await
            .unwrap();

        let IntegrationEvent::JourneyDeleted(wire) = mapper.map(&event).await.unwrap() else {
            panic!("expected journey.deleted.v1");
        };
        assert_eq!(wire.favoriting_user_ids, vec![user("fan")]);
        assert!(wire.shared_with_user_ids.is_empty());
    }

    #[tokio::test]
    async fn user_status_change_maps_directly() {
        let (_, mapper, _) = setup().await;
        let account = UserAccount::new(user("rider"), Timestamp::now());
        let (_, events) = account
            .change_status(UserStatus::Suspended, &user("admin"), Timestamp::now())
            .unwrap();
        let event = OutboxEvent::from(events.into_iter().next().unwrap());

        let IntegrationEvent::UserStatusChanged(wire) = mapper.map(&event).await.unwrap() else {
            panic!("expected user.status_changed.v1");
        };
        assert_eq!(wire.new_status, UserStatus::Suspended);
        assert_eq!(wire.changed_by_user_id, user("admin"));
    }
}
