//! Notification ports - realtime push with a durable fallback.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::{DomainError, JourneyId, UserId};

/// What happened to a journey the recipient follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    JourneyUpdated,
    JourneyDeleted,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::JourneyUpdated => "journey_updated",
            NotificationKind::JourneyDeleted => "journey_deleted",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A message for one recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub kind: NotificationKind,
    pub journey_id: JourneyId,
    pub subject: String,
    pub body: String,
}

/// Best-effort realtime delivery.
#[async_trait]
pub trait PushNotifier: Send + Sync {
    /// Returns true if at least one live channel accepted the message,
    /// false if the user has no active channel or every channel failed.
    async fn try_send(&self, user_id: &UserId, notification: &Notification) -> bool;
}

/// Durable delivery for users without a live channel.
#[async_trait]
pub trait FallbackNotifier: Send + Sync {
    async fn send(
        &self,
        user_id: &UserId,
        kind: NotificationKind,
        subject: &str,
        body: &str,
    ) -> Result<(), DomainError>;
}
