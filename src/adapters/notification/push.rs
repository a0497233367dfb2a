//! Realtime push through the connection registry.
//!
//! A user may hold connections on several servers. The push counts as
//! delivered when at least one server accepts it.

use async_trait::async_trait;
use std::sync::Arc;

use crate::domain::foundation::UserId;
use crate::ports::{ConnectionRegistry, Notification, PushNotifier, ServerMessenger};

pub struct RegistryPushNotifier {
    registry: Arc<dyn ConnectionRegistry>,
    messenger: Arc<dyn ServerMessenger>,
}

impl RegistryPushNotifier {
    pub fn new(registry: Arc<dyn ConnectionRegistry>, messenger: Arc<dyn ServerMessenger>) -> Self {
        Self {
            registry,
            messenger,
        }
    }
}

#[async_trait]
impl PushNotifier for RegistryPushNotifier {
    async fn try_send(&self, user_id: &UserId, notification: &Notification) -> bool {
        let servers = match self.registry.find_servers(user_id).await {
            Ok(servers) => servers,
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "Connection lookup failed");
                return false;
            }
        };

        let mut delivered = false;
        for server_id in &servers {
            match self
                .messenger
                .send_to_server(server_id, user_id, notification)
                .await
            {
                Ok(()) => delivered = true,
                Err(e) => {
                    tracing::debug!(
                        user_id = %user_id,
                        server_id = %server_id,
                        error = %e,
                        "Push to server failed"
                    );
                }
            }
        }

        delivered
    }
}
