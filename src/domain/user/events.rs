//! User account domain events.

use serde::{Deserialize, Serialize};

use super::UserStatus;
use crate::domain::foundation::{domain_event, EventId, Timestamp, UserId};

/// Published when an account's status changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStatusChanged {
    pub event_id: EventId,
    pub user_id: UserId,
    pub previous_status: UserStatus,
    pub new_status: UserStatus,
    pub changed_by_user_id: UserId,
    pub occurred_at: Timestamp,
}

domain_event!(
    UserStatusChanged,
    event_type = "user.status_changed",
    aggregate_id = user_id,
    aggregate_type = "UserAccount",
    occurred_at = occurred_at,
    event_id = event_id
);
