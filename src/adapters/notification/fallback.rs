//! Fallback senders for users without a realtime connection.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use crate::domain::foundation::{DomainError, ErrorCode, UserId};
use crate::ports::{FallbackNotifier, NotificationKind};

/// Writes fallback notifications to the log.
///
/// Stands in for a mail or mobile-push gateway, which lives outside this
/// service.
#[derive(Debug, Clone, Default)]
pub struct TracingFallbackNotifier;

impl TracingFallbackNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl FallbackNotifier for TracingFallbackNotifier {
    async fn send(
        &self,
        user_id: &UserId,
        kind: NotificationKind,
        subject: &str,
        body: &str,
    ) -> Result<(), DomainError> {
        tracing::info!(
            user_id = %user_id,
            kind = %kind,
            subject = subject,
            body_len = body.len(),
            "Fallback notification queued"
        );
        Ok(())
    }
}

/// A fallback notification captured by [`RecordingFallbackNotifier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentFallback {
    pub user_id: UserId,
    pub kind: NotificationKind,
    pub subject: String,
    pub body: String,
}

/// Fallback notifier for tests.
///
/// Records every call and fails for users marked with [`fail_for`].
///
/// [`fail_for`]: RecordingFallbackNotifier::fail_for
#[derive(Debug, Clone, Default)]
pub struct RecordingFallbackNotifier {
    sent: Arc<Mutex<Vec<SentFallback>>>,
    failing: Arc<Mutex<HashSet<UserId>>>,
}

impl RecordingFallbackNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_for(&self, user_id: UserId) {
        if let Ok(mut failing) = self.failing.lock() {
            failing.insert(user_id);
        }
    }

    pub fn sent(&self) -> Vec<SentFallback> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl FallbackNotifier for RecordingFallbackNotifier {
    async fn send(
        &self,
        user_id: &UserId,
        kind: NotificationKind,
        subject: &str,
        body: &str,
    ) -> Result<(), DomainError> {
        let fails = self
            .failing
            .lock()
            .map(|f| f.contains(user_id))
            .unwrap_or(false);
        if fails {
            return Err(DomainError::new(
                ErrorCode::ExternalServiceError,
                format!("Fallback delivery to {} failed", user_id),
            ));
        }

        if let Ok(mut sent) = self.sent.lock() {
            sent.push(SentFallback {
                user_id: user_id.clone(),
                kind,
                subject: subject.to_string(),
                body: body.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn tracing_notifier_always_succeeds() {
        let notifier = TracingFallbackNotifier::new();
        let result = notifier
            .send(
                &UserId::new("bob").unwrap(),
                NotificationKind::JourneyDeleted,
                "Journey deleted",
                "A journey you follow was deleted",
            )
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn recording_notifier_records_and_fails_on_demand() {
        let notifier = RecordingFallbackNotifier::new();
        let bob = UserId::new("bob").unwrap();
        let carol = UserId::new("carol").unwrap();
        notifier.fail_for(carol.clone());

        notifier
            .send(&bob, NotificationKind::JourneyUpdated, "s", "b")
            .await
            .unwrap();
        let err = notifier
            .send(&carol, NotificationKind::JourneyUpdated, "s", "b")
            .await
            .unwrap_err();

        assert_eq!(err.code, ErrorCode::ExternalServiceError);
        assert_eq!(notifier.sent().len(), 1);
        assert_eq!(notifier.sent()[0].user_id, bob);
    }
}
