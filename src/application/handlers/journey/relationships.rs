//! Favorite and share handlers.
//!
//! These write relationship rows only; no outbox event is raised. The relay
//! reads them when it builds Updated and Deleted wire events.

use std::sync::Arc;

use crate::domain::foundation::{DomainError, ErrorCode, JourneyId, Timestamp, UserId};
use crate::domain::journey::{Favorite, Share};
use crate::ports::{JourneyRepository, RelationshipRepository};

use super::load_journey;

pub struct FavoriteJourneyHandler {
    journeys: Arc<dyn JourneyRepository>,
    relationships: Arc<dyn RelationshipRepository>,
}

impl FavoriteJourneyHandler {
    pub fn new(
        journeys: Arc<dyn JourneyRepository>,
        relationships: Arc<dyn RelationshipRepository>,
    ) -> Self {
        Self {
            journeys,
            relationships,
        }
    }

    /// Favorites a journey. Favoriting twice is a no-op.
    pub async fn favorite(&self, journey_id: JourneyId, user_id: UserId) -> Result<(), DomainError> {
        load_journey(self.journeys.as_ref(), &journey_id).await?;
        self.relationships
            .add_favorite(&Favorite {
                journey_id,
                user_id,
                created_at: Timestamp::now(),
            })
            .await
    }

    /// Returns false if the journey was not favorited.
    pub async fn unfavorite(&self, journey_id: &JourneyId, user_id: &UserId) -> Result<bool, DomainError> {
        self.relationships.remove_favorite(journey_id, user_id).await
    }
}

#[derive(Debug, Clone)]
pub struct ShareJourneyCommand {
    pub journey_id: JourneyId,
    pub acting_user: UserId,
    pub shared_with: UserId,
}

/// Only the owner may share or unshare.
pub struct ShareJourneyHandler {
    journeys: Arc<dyn JourneyRepository>,
    relationships: Arc<dyn RelationshipRepository>,
}

impl ShareJourneyHandler {
    pub fn new(
        journeys: Arc<dyn JourneyRepository>,
        relationships: Arc<dyn RelationshipRepository>,
    ) -> Self {
        Self {
            journeys,
            relationships,
        }
    }

    pub async fn share(&self, cmd: ShareJourneyCommand) -> Result<(), DomainError> {
        self.ensure_owner(&cmd.journey_id, &cmd.acting_user).await?;
        let share = Share::new(cmd.journey_id, cmd.shared_with, cmd.acting_user, Timestamp::now())?;
        self.relationships.add_share(&share).await
    }

    pub async fn unshare(&self, cmd: ShareJourneyCommand) -> Result<bool, DomainError> {
        self.ensure_owner(&cmd.journey_id, &cmd.acting_user).await?;
        self.relationships
            .remove_share(&cmd.journey_id, &cmd.shared_with)
            .await
    }

    async fn ensure_owner(&self, journey_id: &JourneyId, acting_user: &UserId) -> Result<(), DomainError> {
        let journey = load_journey(self.journeys.as_ref(), journey_id).await?;
        if !journey.is_owner(acting_user) {
            return Err(DomainError::new(
                ErrorCode::Forbidden,
                "Only the owner can share a journey",
            )
            .with_detail("journey_id", journey_id.to_string()));
        }
        Ok(())
    }
}
