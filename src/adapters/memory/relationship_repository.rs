//! In-memory favorites and shares.

use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use crate::domain::foundation::{DomainError, JourneyId, UserId};
use crate::domain::journey::{Favorite, Share};
use crate::ports::RelationshipRepository;

/// Keyed by (journey, user); BTreeMap gives the stable order the port promises.
#[derive(Default)]
pub struct InMemoryRelationshipRepository {
    favorites: RwLock<BTreeMap<(JourneyId, UserId), Favorite>>,
    shares: RwLock<BTreeMap<(JourneyId, UserId), Share>>,
}

impl InMemoryRelationshipRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RelationshipRepository for InMemoryRelationshipRepository {
    async fn add_favorite(&self, favorite: &Favorite) -> Result<(), DomainError> {
        self.favorites
            .write()
            .await
            .entry((favorite.journey_id, favorite.user_id.clone()))
            .or_insert_with(|| favorite.clone());
        Ok(())
    }

    async fn remove_favorite(
        &self,
        journey_id: &JourneyId,
        user_id: &UserId,
    ) -> Result<bool, DomainError> {
        Ok(self
            .favorites
            .write()
            .await
            .remove(&(*journey_id, user_id.clone()))
            .is_some())
    }

    async fn find_favorite(
        &self,
        journey_id: &JourneyId,
        user_id: &UserId,
    ) -> Result<Option<Favorite>, DomainError> {
        Ok(self
            .favorites
            .read()
            .await
            .get(&(*journey_id, user_id.clone()))
            .cloned())
    }

    async fn favoriting_users(&self, journey_id: &JourneyId) -> Result<Vec<UserId>, DomainError> {
        Ok(self
            .favorites
            .read()
            .await
            .keys()
            .filter(|(j, _)| j == journey_id)
            .map(|(_, u)| u.clone())
            .collect())
    }

    async fn add_share(&self, share: &Share) -> Result<(), DomainError> {
        self.shares
            .write()
            .await
            .entry((share.journey_id, share.shared_with_user_id.clone()))
            .or_insert_with(|| share.clone());
        Ok(())
    }

    async fn remove_share(
        &self,
        journey_id: &JourneyId,
        shared_with: &UserId,
    ) -> Result<bool, DomainError> {
        Ok(self
            .shares
            .write()
            .await
            .remove(&(*journey_id, shared_with.clone()))
            .is_some())
    }

    async fn find_share(
        &self,
        journey_id: &JourneyId,
        shared_with: &UserId,
    ) -> Result<Option<Share>, DomainError> {
        Ok(self
            .shares
            .read()
            .await
            .get(&(*journey_id, shared_with.clone()))
            .cloned())
    }

    async fn shared_with_users(
        &self,
        journey_id: &JourneyId,
    ) -> Result<Vec<UserId>, DomainError> {
        Ok(self
            .shares
            .read()
            .await
            .keys()
            .filter(|(j, _)| j == journey_id)
            .map(|(_, u)| u.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::Timestamp;

    fn user(id: &str) -> UserId {
        UserId::new(id).unwrap()
    }

    #[tokio::test]
    async fn favorites_are_scoped_to_their_journey() {
        let repo = InMemoryRelationshipRepository::new();
        let journey = JourneyId::new();
        let other = JourneyId::new();

        for (j, u) in [(journey, "b"), (journey, "a"), (other, "c")] {
            repo.add_favorite(&Favorite {
                journey_id: j,
                user_id: user(u),
                created_at: Timestamp::now(),
            })
            .await
            .unwrap();
        }

        assert_eq!(
            repo.favoriting_users(&journey).await.unwrap(),
            vec![user("a"), user("b")]
        );
        assert!(repo.find_favorite(&other, &user("c")).await.unwrap().is_some());
        assert!(repo.remove_favorite(&other, &user("c")).await.unwrap());
        assert!(!repo.remove_favorite(&other, &user("c")).await.unwrap());
    }

    #[tokio::test]
    async fn sharing_twice_keeps_the_first_share() {
        let repo = InMemoryRelationshipRepository::new();
        let journey = JourneyId::new();
        let first = Share::new(journey, user("friend"), user("owner"), Timestamp::now()).unwrap();
        let second = Share::new(journey, user("friend"), user("owner"), Timestamp::now()).unwrap();

        repo.add_share(&first).await.unwrap();
        repo.add_share(&second).await.unwrap();

        assert_eq!(repo.shared_with_users(&journey).await.unwrap(), vec![user("friend")]);
        assert_eq!(
            repo.find_share(&journey, &user("friend")).await.unwrap(),
            Some(first)
        );
    }
}
