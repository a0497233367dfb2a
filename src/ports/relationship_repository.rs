//! RelationshipRepository port - Favorites and shares keyed by (journey, user).
//!
//! The relay reads the audience of a journey through this port when it builds
//! `journey.updated.v1` and `journey.deleted.v1`, so the lists reflect the
//! state at publish time rather than at mutation time.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, JourneyId, UserId};
use crate::domain::journey::{Favorite, Share};

#[async_trait]
pub trait RelationshipRepository: Send + Sync {
    /// Add a favorite. Adding an existing favorite is a no-op.
    async fn add_favorite(&self, favorite: &Favorite) -> Result<(), DomainError>;

    /// Remove a favorite. Returns false if it did not exist.
    async fn remove_favorite(
        &self,
        journey_id: &JourneyId,
        user_id: &UserId,
    ) -> Result<bool, DomainError>;

    async fn find_favorite(
        &self,
        journey_id: &JourneyId,
        user_id: &UserId,
    ) -> Result<Option<Favorite>, DomainError>;

    /// Users who favorited the journey, in a stable order.
    async fn favoriting_users(&self, journey_id: &JourneyId) -> Result<Vec<UserId>, DomainError>;

    /// Add a share. Sharing twice with the same user is a no-op.
    async fn add_share(&self, share: &Share) -> Result<(), DomainError>;

    /// Remove a share. Returns false if it did not exist.
    async fn remove_share(
        &self,
        journey_id: &JourneyId,
        shared_with: &UserId,
    ) -> Result<bool, DomainError>;

    async fn find_share(
        &self,
        journey_id: &JourneyId,
        shared_with: &UserId,
    ) -> Result<Option<Share>, DomainError>;

    /// Users the journey is shared with, in a stable order.
    async fn shared_with_users(&self, journey_id: &JourneyId)
        -> Result<Vec<UserId>, DomainError>;
}
