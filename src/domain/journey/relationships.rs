//! Users who follow a journey without owning it.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{DomainError, JourneyId, Timestamp, UserId};

/// A user marked a journey as a favorite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Favorite {
    pub journey_id: JourneyId,
    pub user_id: UserId,
    pub created_at: Timestamp,
}

/// The owner shared a journey with another user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Share {
    pub journey_id: JourneyId,
    pub shared_with_user_id: UserId,
    pub shared_by_user_id: UserId,
    pub created_at: Timestamp,
}

impl Share {
    /// Creates a share.
    ///
    /// # Errors
    ///
    /// - `ValidationFailed` if a user shares a journey with themselves
    pub fn new(
        journey_id: JourneyId,
        shared_with_user_id: UserId,
        shared_by_user_id: UserId,
        now: Timestamp,
    ) -> Result<Self, DomainError> {
        if shared_with_user_id == shared_by_user_id {
            return Err(DomainError::validation(
                "shared_with_user_id",
                "A journey cannot be shared with its owner",
            ));
        }
        Ok(Self {
            journey_id,
            shared_with_user_id,
            shared_by_user_id,
            created_at: now,
        })
    }
}
