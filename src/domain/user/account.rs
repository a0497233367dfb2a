//! User account aggregate.
//!
//! Only the lifecycle status lives here; profile data is owned elsewhere.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::UserStatusChanged;
use crate::domain::foundation::{
    DomainError, ErrorCode, EventId, Timestamp, UserId, ValidationError,
};

/// Lifecycle status of a user account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UserStatus {
    #[default]
    Active,
    Suspended,
    Deactivated,
}

impl UserStatus {
    /// Validates a transition from this status to another.
    ///
    /// Valid transitions:
    /// - Active -> Suspended | Deactivated
    /// - Suspended -> Active | Deactivated
    pub fn can_transition_to(&self, target: &UserStatus) -> bool {
        use UserStatus::*;
        matches!(
            (self, target),
            (Active, Suspended) | (Active, Deactivated) | (Suspended, Active) | (Suspended, Deactivated)
        )
    }

    /// Deactivated accounts never change again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, UserStatus::Deactivated)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => "active",
            UserStatus::Suspended => "suspended",
            UserStatus::Deactivated => "deactivated",
        }
    }
}

impl fmt::Display for UserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(UserStatus::Active),
            "suspended" => Ok(UserStatus::Suspended),
            "deactivated" => Ok(UserStatus::Deactivated),
            other => Err(ValidationError::invalid_format(
                "status",
                format!("unknown user status '{}'", other),
            )),
        }
    }
}

/// A user account whose status changes are propagated to other services.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAccount {
    id: UserId,
    status: UserStatus,
    updated_at: Timestamp,
}

impl UserAccount {
    /// Creates an active account.
    pub fn new(id: UserId, now: Timestamp) -> Self {
        Self {
            id,
            status: UserStatus::Active,
            updated_at: now,
        }
    }

    /// Reconstitute an account from persistence.
    pub fn reconstitute(id: UserId, status: UserStatus, updated_at: Timestamp) -> Self {
        Self {
            id,
            status,
            updated_at,
        }
    }

    pub fn id(&self) -> &UserId {
        &self.id
    }

    pub fn status(&self) -> UserStatus {
        self.status
    }

    pub fn updated_at(&self) -> Timestamp {
        self.updated_at
    }

    /// Moves the account to `target`, recording who did it.
    ///
    /// # Errors
    ///
    /// - `InvalidStateTransition` if the move is not allowed
    pub fn change_status(
        &self,
        target: UserStatus,
        changed_by: &UserId,
        now: Timestamp,
    ) -> Result<(Self, Vec<UserStatusChanged>), DomainError> {
        if !self.status.can_transition_to(&target) {
            return Err(DomainError::new(
                ErrorCode::InvalidStateTransition,
                format!("Cannot change user status from {} to {}", self.status, target),
            )
            .with_detail("user_id", self.id.as_str()));
        }

        let event = UserStatusChanged {
            event_id: EventId::new(),
            user_id: self.id.clone(),
            previous_status: self.status,
            new_status: target,
            changed_by_user_id: changed_by.clone(),
            occurred_at: now,
        };
        let next = Self {
            status: target,
            updated_at: now,
            ..self.clone()
        };
        Ok((next, vec![event]))
    }
}
