//! In-memory journey and user account repositories.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::InMemoryOutbox;
use crate::domain::foundation::{DomainError, JourneyId, UserId};
use crate::domain::journey::Journey;
use crate::domain::outbox::OutboxEvent;
use crate::domain::user::UserAccount;
use crate::ports::{
    journey_not_found, version_conflict, JourneyRepository, OutboxRecord, UserAccountRepository,
};

/// Journeys plus their outbox. The state lock is held while rows are
/// appended, so readers never see one without the other.
pub struct InMemoryJourneyRepository {
    journeys: Mutex<HashMap<JourneyId, Journey>>,
    outbox: Arc<InMemoryOutbox>,
}

impl InMemoryJourneyRepository {
    pub fn new(outbox: Arc<InMemoryOutbox>) -> Self {
        Self {
            journeys: Mutex::new(HashMap::new()),
            outbox,
        }
    }
}

#[async_trait]
impl JourneyRepository for InMemoryJourneyRepository {
    async fn save(&self, journey: &Journey, events: &[OutboxEvent]) -> Result<(), DomainError> {
        let records = OutboxRecord::from_events(events)?;
        let id = journey.id();
        let mut journeys = self.journeys.lock().await;

        if journey.version() <= 1 {
            if journeys.contains_key(&id) {
                return Err(version_conflict(&id, 0));
            }
        } else {
            let expected = journey.version() - 1;
            match journeys.get(&id) {
                None => return Err(journey_not_found(&id)),
                Some(stored) if stored.version() != expected => {
                    return Err(version_conflict(&id, expected));
                }
                Some(_) => {}
            }
        }

        journeys.insert(id, journey.clone());
        self.outbox.append(records).await;
        Ok(())
    }

    async fn delete(&self, journey: &Journey, events: &[OutboxEvent]) -> Result<(), DomainError> {
        let records = OutboxRecord::from_events(events)?;
        let id = journey.id();
        let mut journeys = self.journeys.lock().await;

        match journeys.get(&id) {
            None => return Err(journey_not_found(&id)),
            Some(stored) if stored.version() != journey.version() => {
                return Err(version_conflict(&id, journey.version()));
            }
            Some(_) => {}
        }

        journeys.remove(&id);
        self.outbox.append(records).await;
        Ok(())
    }

    async fn find_by_id(&self, id: &JourneyId) -> Result<Option<Journey>, DomainError> {
        Ok(self.journeys.lock().await.get(id).cloned())
    }
}

/// Accounts plus their outbox.
pub struct InMemoryUserAccountRepository {
    accounts: Mutex<HashMap<UserId, UserAccount>>,
    outbox: Arc<InMemoryOutbox>,
}

impl InMemoryUserAccountRepository {
    pub fn new(outbox: Arc<InMemoryOutbox>) -> Self {
        Self {
            accounts: Mutex::new(HashMap::new()),
            outbox,
        }
    }
}

#[async_trait]
impl UserAccountRepository for InMemoryUserAccountRepository {
    async fn save(&self, account: &UserAccount, events: &[OutboxEvent]) -> Result<(), DomainError> {
        let records = OutboxRecord::from_events(events)?;
        let mut accounts = self.accounts.lock().await;
        accounts.insert(account.id().clone(), account.clone());
        self.outbox.append(records).await;
        Ok(())
    }

    async fn find_by_id(&self, id: &UserId) -> Result<Option<UserAccount>, DomainError> {
        Ok(self.accounts.lock().await.get(id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::{DistanceKm, ErrorCode, Timestamp};
    use crate::domain::journey::{JourneyDetails, Location, TransportType};

    fn new_journey() -> (Journey, Vec<OutboxEvent>) {
        let start = Timestamp::parse_rfc3339("2024-05-01T06:00:00Z").unwrap();
        let (journey, events) = Journey::create(
            JourneyId::new(),
            UserId::new("owner").unwrap(),
            JourneyDetails {
                start_location: Location::new("A").unwrap(),
                start_time: start,
                arrival_location: Location::new("B").unwrap(),
                arrival_time: start.plus_secs(900),
                transport_type: TransportType::Train,
                distance_km: DistanceKm::try_from_km(40.0).unwrap(),
            },
            start,
        )
        .unwrap();
        (journey, events.into_iter().map(OutboxEvent::from).collect())
    }

    #[tokio::test]
    async fn save_writes_state_and_outbox_rows() {
        let outbox = Arc::new(InMemoryOutbox::new());
        let repo = InMemoryJourneyRepository::new(outbox.clone());
        let (journey, events) = new_journey();

        repo.save(&journey, &events).await.unwrap();

        assert_eq!(repo.find_by_id(&journey.id()).await.unwrap(), Some(journey));
        let rows = outbox.pending().await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].event_type, "journey.created");
    }

    #[tokio::test]
    async fn delete_of_unknown_journey_writes_nothing() {
        let outbox = Arc::new(InMemoryOutbox::new());
        let repo = InMemoryJourneyRepository::new(outbox.clone());
        let (journey, events) = new_journey();

        let err = repo.delete(&journey, &events).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::JourneyNotFound);
        assert!(outbox.rows().await.is_empty());
    }

    fn moved(journey: &Journey, km: f64) -> (Journey, Vec<OutboxEvent>) {
        let mut details = journey.details().clone();
        details.distance_km = DistanceKm::try_from_km(km).unwrap();
        let (next, events) = journey
            .update(journey.user_id(), details, Timestamp::now())
            .unwrap();
        (next, events.into_iter().map(OutboxEvent::from).collect())
    }

    #[tokio::test]
    async fn second_write_from_the_same_state_conflicts() {
        let outbox = Arc::new(InMemoryOutbox::new());
        let repo = InMemoryJourneyRepository::new(outbox.clone());
        let (journey, events) = new_journey();
        repo.save(&journey, &events).await.unwrap();

        let (first, first_events) = moved(&journey, 50.0);
        let (second, second_events) = moved(&journey, 60.0);
        repo.save(&first, &first_events).await.unwrap();
        let err = repo.save(&second, &second_events).await.unwrap_err();

        assert_eq!(err.code, ErrorCode::ConcurrencyConflict);
        assert_eq!(repo.find_by_id(&journey.id()).await.unwrap(), Some(first));
        assert_eq!(outbox.rows().await.len(), 2);
    }

    #[tokio::test]
    async fn creating_an_existing_id_conflicts() {
        let outbox = Arc::new(InMemoryOutbox::new());
        let repo = InMemoryJourneyRepository::new(outbox.clone());
        let (journey, events) = new_journey();
        repo.save(&journey, &events).await.unwrap();

        let err = repo.save(&journey, &events).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ConcurrencyConflict);
        assert_eq!(outbox.rows().await.len(), 1);
    }

    #[tokio::test]
    async fn stale_writes_after_delete_do_not_resurrect() {
        let outbox = Arc::new(InMemoryOutbox::new());
        let repo = InMemoryJourneyRepository::new(outbox.clone());
        let (journey, events) = new_journey();
        repo.save(&journey, &events).await.unwrap();
        let deleted: Vec<OutboxEvent> = journey
            .delete(journey.user_id(), Timestamp::now())
            .unwrap()
            .into_iter()
            .map(OutboxEvent::from)
            .collect();
        repo.delete(&journey, &deleted).await.unwrap();

        let (stale, stale_events) = moved(&journey, 70.0);
        let err = repo.save(&stale, &stale_events).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::JourneyNotFound);
        assert!(repo.find_by_id(&journey.id()).await.unwrap().is_none());
        assert_eq!(outbox.rows().await.len(), 2);
    }

    #[tokio::test]
    async fn delete_from_a_stale_state_conflicts() {
        let outbox = Arc::new(InMemoryOutbox::new());
        let repo = InMemoryJourneyRepository::new(outbox.clone());
        let (journey, events) = new_journey();
        repo.save(&journey, &events).await.unwrap();
        let (updated, updated_events) = moved(&journey, 45.0);
        repo.save(&updated, &updated_events).await.unwrap();

        let err = repo.delete(&journey, &[]).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::ConcurrencyConflict);
        assert_eq!(repo.find_by_id(&journey.id()).await.unwrap(), Some(updated));
    }
}
