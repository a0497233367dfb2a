//! NotificationFanout - Tells followers of a journey that it changed.
//!
//! The audience is the union of favoriting and shared-with users carried on
//! the event, minus the acting user. Each recipient gets a realtime push if
//! they have a live connection and a fallback notification otherwise.
//! Recipients are handled concurrently and independently.

use async_trait::async_trait;
use futures::future::join_all;
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::domain::foundation::{DomainError, EventEnvelope, JourneyId, UserId};
use crate::domain::integration::IntegrationEvent;
use crate::domain::journey::Location;
use crate::ports::{EventHandler, FallbackNotifier, Notification, NotificationKind, PushNotifier};

/// Per-event delivery counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanoutReport {
    pub pushed: usize,
    pub fell_back: usize,
    pub failed: usize,
}

impl FanoutReport {
    pub fn recipients(&self) -> usize {
        self.pushed + self.fell_back + self.failed
    }
}

enum Delivery {
    Pushed,
    FellBack,
    Failed,
}

pub struct NotificationFanout {
    push: Arc<dyn PushNotifier>,
    fallback: Arc<dyn FallbackNotifier>,
}

impl NotificationFanout {
    pub fn new(push: Arc<dyn PushNotifier>, fallback: Arc<dyn FallbackNotifier>) -> Self {
        Self { push, fallback }
    }

    /// Notifies the audience of an Updated or Deleted event.
    ///
    /// Other events produce an empty report. Individual delivery failures are
    /// counted, never returned.
    pub async fn fan_out(&self, event: &IntegrationEvent) -> FanoutReport {
        let (notification, actor, favoriting, shared_with) = match event {
            IntegrationEvent::JourneyUpdated(e) => (
                notification(
                    NotificationKind::JourneyUpdated,
                    e.journey_id,
                    &e.start_location,
                    &e.arrival_location,
                ),
                &e.user_id,
                &e.favoriting_user_ids,
                &e.shared_with_user_ids,
            ),
            IntegrationEvent::JourneyDeleted(e) => (
                notification(
                    NotificationKind::JourneyDeleted,
                    e.journey_id,
                    &e.start_location,
                    &e.arrival_location,
                ),
                &e.user_id,
                &e.favoriting_user_ids,
                &e.shared_with_user_ids,
            ),
            IntegrationEvent::JourneyCreated(_)
            | IntegrationEvent::DailyGoalAchieved(_)
            | IntegrationEvent::UserStatusChanged(_) => return FanoutReport::default(),
        };

        let recipients = audience(actor, favoriting, shared_with);
        let deliveries = join_all(
            recipients
                .iter()
                .map(|user_id| self.deliver(user_id, &notification)),
        )
        .await;

        let mut report = FanoutReport::default();
        for delivery in deliveries {
            match delivery {
                Delivery::Pushed => report.pushed += 1,
                Delivery::FellBack => report.fell_back += 1,
                Delivery::Failed => report.failed += 1,
            }
        }
        report
    }

    async fn deliver(&self, user_id: &UserId, notification: &Notification) -> Delivery {
        if self.push.try_send(user_id, notification).await {
            return Delivery::Pushed;
        }

        match self
            .fallback
            .send(
                user_id,
                notification.kind,
                &notification.subject,
                &notification.body,
            )
            .await
        {
            Ok(()) => Delivery::FellBack,
            Err(e) => {
                tracing::warn!(
                    user_id = %user_id,
                    journey_id = %notification.journey_id,
                    error = %e,
                    "Fallback notification failed"
                );
                Delivery::Failed
            }
        }
    }
}

fn audience<'a>(
    actor: &UserId,
    favoriting: &'a [UserId],
    shared_with: &'a [UserId],
) -> BTreeSet<&'a UserId> {
    favoriting
        .iter()
        .chain(shared_with)
        .filter(|user_id| *user_id != actor)
        .collect()
}

fn notification(
    kind: NotificationKind,
    journey_id: JourneyId,
    from: &Location,
    to: &Location,
) -> Notification {
    let (subject, verb) = match kind {
        NotificationKind::JourneyUpdated => ("Journey updated", "was updated"),
        NotificationKind::JourneyDeleted => ("Journey deleted", "was deleted"),
    };
    Notification {
        kind,
        journey_id,
        subject: subject.to_string(),
        body: format!("The journey from {} to {} {}.", from, to, verb),
    }
}

#[async_trait]
impl EventHandler for NotificationFanout {
    async fn handle(&self, envelope: EventEnvelope) -> Result<(), DomainError> {
        let event = IntegrationEvent::decode(&envelope)?;
        let report = self.fan_out(&event).await;

        if report.recipients() > 0 {
            tracing::info!(
                event_id = %envelope.event_id,
                pushed = report.pushed,
                fell_back = report.fell_back,
                failed = report.failed,
                "Journey change fanned out"
            );
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "NotificationFanout"
    }
}
