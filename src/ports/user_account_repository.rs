//! UserAccountRepository port - Persistence for account status.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, UserId};
use crate::domain::outbox::OutboxEvent;
use crate::domain::user::UserAccount;

/// Same atomicity contract as `JourneyRepository`: state and outbox rows
/// are written together or not at all.
#[async_trait]
pub trait UserAccountRepository: Send + Sync {
    async fn save(&self, account: &UserAccount, events: &[OutboxEvent]) -> Result<(), DomainError>;

    async fn find_by_id(&self, id: &UserId) -> Result<Option<UserAccount>, DomainError>;
}
