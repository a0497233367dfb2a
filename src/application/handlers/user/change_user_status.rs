//! ChangeUserStatusHandler - Moves an account between statuses.
//!
//! Accounts mirror identities owned elsewhere, so an id seen for the first
//! time starts out `Active`.

use std::sync::Arc;

use crate::domain::foundation::{DomainError, Timestamp, UserId};
use crate::domain::outbox::OutboxEvent;
use crate::domain::user::{UserAccount, UserStatus};
use crate::ports::UserAccountRepository;

#[derive(Debug, Clone)]
pub struct ChangeUserStatusCommand {
    pub user_id: UserId,
    pub target: UserStatus,
    pub changed_by: UserId,
}

pub struct ChangeUserStatusHandler {
    repository: Arc<dyn UserAccountRepository>,
}

impl ChangeUserStatusHandler {
    pub fn new(repository: Arc<dyn UserAccountRepository>) -> Self {
        Self { repository }
    }

    pub async fn handle(&self, cmd: ChangeUserStatusCommand) -> Result<UserAccount, DomainError> {
        let now = Timestamp::now();
        let current = self
            .repository
            .find_by_id(&cmd.user_id)
            .await?
            .unwrap_or_else(|| UserAccount::new(cmd.user_id.clone(), now));

        let (account, events) = current.change_status(cmd.target, &cmd.changed_by, now)?;
        let events: Vec<OutboxEvent> = events.into_iter().map(OutboxEvent::from).collect();
        self.repository.save(&account, &events).await?;

        tracing::info!(
            user_id = %account.id(),
            status = %account.status(),
            changed_by = %cmd.changed_by,
            "User status changed"
        );
        Ok(account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{InMemoryOutbox, InMemoryUserAccountRepository};
    use crate::domain::foundation::ErrorCode;

    fn user(id: &str) -> UserId {
        UserId::new(id).unwrap()
    }

    fn setup() -> (Arc<InMemoryOutbox>, ChangeUserStatusHandler) {
        let outbox = Arc::new(InMemoryOutbox::new());
        let repository = Arc::new(InMemoryUserAccountRepository::new(outbox.clone()));
        (outbox, ChangeUserStatusHandler::new(repository))
    }

    #[tokio::test]
    async fn suspends_active_user_and_writes_event() {
        let (outbox, handler) = setup();

        let account = handler
            .handle(ChangeUserStatusCommand {
                user_id: user("rider"),
                target: UserStatus::Suspended,
                changed_by: user("admin"),
            })
            .await
            .unwrap();

        assert_eq!(account.status(), UserStatus::Suspended);
        let rows = outbox.rows().await;
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].event_type, "user.status_changed");
    }

    #[tokio::test]
    async fn deactivated_user_cannot_be_reactivated() {
        let (outbox, handler) = setup();
        handler
            .handle(ChangeUserStatusCommand {
                user_id: user("rider"),
                target: UserStatus::Deactivated,
                changed_by: user("admin"),
            })
            .await
            .unwrap();

        let err = handler
            .handle(ChangeUserStatusCommand {
                user_id: user("rider"),
                target: UserStatus::Active,
                changed_by: user("admin"),
            })
            .await
            .unwrap_err();

        assert_eq!(err.code, ErrorCode::InvalidStateTransition);
        assert_eq!(outbox.rows().await.len(), 1);
    }
}
