//! Journey aggregate entity.
//!
//! A journey is one recorded trip. Every mutation is a pure function that
//! returns the next state together with the events it produced; persisting
//! both atomically is the repository's job.

use serde::{Deserialize, Serialize};

use super::{JourneyDetails, JourneyEvent};
use crate::domain::foundation::{DomainError, ErrorCode, JourneyId, Timestamp, UserId};

/// Journey aggregate - source of truth for distance projections.
///
/// # Invariants
///
/// - `id` is globally unique
/// - `details.arrival_time` is strictly after `details.start_time`
/// - `details.distance_km` is greater than zero
/// - only the owner may update or delete the journey
/// - `version` starts at 1 and grows by one with every persisted change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Journey {
    id: JourneyId,
    user_id: UserId,
    details: JourneyDetails,
    version: u32,
    created_at: Timestamp,
    updated_at: Timestamp,
}

impl Journey {
    /// Records a new journey.
    ///
    /// # Errors
    ///
    /// - `ValidationFailed` if the details break an invariant
    pub fn create(
        id: JourneyId,
        user_id: UserId,
        details: JourneyDetails,
        now: Timestamp,
    ) -> Result<(Self, Vec<JourneyEvent>), DomainError> {
        details.validate()?;

        let event = JourneyEvent::created(id, user_id.clone(), &details, now);
        let journey = Self {
            id,
            user_id,
            details,
            version: 1,
            created_at: now,
            updated_at: now,
        };
        Ok((journey, vec![event]))
    }

    /// Reconstitute a journey from persistence (no validation, no events).
    pub fn reconstitute(
        id: JourneyId,
        user_id: UserId,
        details: JourneyDetails,
        version: u32,
        created_at: Timestamp,
        updated_at: Timestamp,
    ) -> Self {
        Self {
            id,
            user_id,
            details,
            version,
            created_at,
            updated_at,
        }
    }

    // ───────────────────────────────────────────────────────────────
    // Accessors
    // ───────────────────────────────────────────────────────────────

    pub fn id(&self) -> JourneyId {
        self.id
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn details(&self) -> &JourneyDetails {
        &self.details
    }

    /// Version of the stored row this state was read from or will become.
    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    pub fn updated_at(&self) -> Timestamp {
        self.updated_at
    }

    /// True if `user_id` owns this journey.
    pub fn is_owner(&self, user_id: &UserId) -> bool {
        &self.user_id == user_id
    }

    // ───────────────────────────────────────────────────────────────
    // Mutations
    // ───────────────────────────────────────────────────────────────

    /// Replaces the journey details.
    ///
    /// Identical details produce no event and leave `updated_at` and the
    /// version untouched.
    ///
    /// # Errors
    ///
    /// - `Forbidden` if `acting_user` is not the owner
    /// - `ValidationFailed` if the new details break an invariant
    pub fn update(
        &self,
        acting_user: &UserId,
        details: JourneyDetails,
        now: Timestamp,
    ) -> Result<(Self, Vec<JourneyEvent>), DomainError> {
        self.ensure_owner(acting_user)?;
        details.validate()?;

        if details == self.details {
            return Ok((self.clone(), Vec::new()));
        }

        let event =
            JourneyEvent::updated(self.id, self.user_id.clone(), &self.details, &details, now);
        let next = Self {
            details,
            version: self.version.saturating_add(1),
            updated_at: now,
            ..self.clone()
        };
        Ok((next, vec![event]))
    }

    /// Deletes the journey, returning the event describing what was removed.
    ///
    /// # Errors
    ///
    /// - `Forbidden` if `acting_user` is not the owner
    pub fn delete(
        &self,
        acting_user: &UserId,
        now: Timestamp,
    ) -> Result<Vec<JourneyEvent>, DomainError> {
        self.ensure_owner(acting_user)?;
        Ok(vec![JourneyEvent::deleted(
            self.id,
            self.user_id.clone(),
            &self.details,
            now,
        )])
    }

    // ───────────────────────────────────────────────────────────────
    // Private helpers
    // ───────────────────────────────────────────────────────────────

    fn ensure_owner(&self, acting_user: &UserId) -> Result<(), DomainError> {
        if !self.is_owner(acting_user) {
            return Err(DomainError::new(
                ErrorCode::Forbidden,
                "Only the owner can modify a journey",
            )
            .with_detail("journey_id", self.id.to_string())
            .with_detail("acting_user", acting_user.as_str()));
        }
        Ok(())
    }
}
