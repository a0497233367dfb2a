//! In-memory connection registry and server messenger.
//!
//! Single-process stand-ins for the Redis adapters. Entries carry an expiry
//! so heartbeat behaviour can be exercised without a broker.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::time::Duration;
use tokio::sync::RwLock;

use crate::domain::foundation::{Timestamp, UserId};
use crate::ports::{
    ConnectionRegistry, ConnectionRegistryError, Notification, ServerId, ServerMessenger,
};

/// Connections keyed by (user, server), each with an expiry.
pub struct InMemoryConnectionRegistry {
    ttl: Duration,
    connections: RwLock<BTreeMap<(UserId, ServerId), Timestamp>>,
}

impl InMemoryConnectionRegistry {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            connections: RwLock::new(BTreeMap::new()),
        }
    }

    fn expiry(&self) -> Timestamp {
        Timestamp::now().plus_secs(self.ttl.as_secs() as i64)
    }
}

impl Default for InMemoryConnectionRegistry {
    fn default() -> Self {
        Self::new(Duration::from_secs(60))
    }
}

#[async_trait]
impl ConnectionRegistry for InMemoryConnectionRegistry {
    async fn register(
        &self,
        user_id: &UserId,
        server_id: &ServerId,
    ) -> Result<(), ConnectionRegistryError> {
        let expires_at = self.expiry();
        self.connections
            .write()
            .await
            .insert((user_id.clone(), server_id.clone()), expires_at);
        Ok(())
    }

    async fn unregister(
        &self,
        user_id: &UserId,
        server_id: &ServerId,
    ) -> Result<(), ConnectionRegistryError> {
        self.connections
            .write()
            .await
            .remove(&(user_id.clone(), server_id.clone()));
        Ok(())
    }

    async fn find_servers(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<ServerId>, ConnectionRegistryError> {
        let now = Timestamp::now();
        Ok(self
            .connections
            .read()
            .await
            .iter()
            .filter(|((user, _), expires_at)| user == user_id && expires_at.is_after(&now))
            .map(|((_, server), _)| server.clone())
            .collect())
    }

    async fn heartbeat(
        &self,
        user_id: &UserId,
        server_id: &ServerId,
    ) -> Result<(), ConnectionRegistryError> {
        let expires_at = self.expiry();
        if let Some(entry) = self
            .connections
            .write()
            .await
            .get_mut(&(user_id.clone(), server_id.clone()))
        {
            *entry = expires_at;
        }
        Ok(())
    }

    async fn cleanup_server(&self, server_id: &ServerId) -> Result<u64, ConnectionRegistryError> {
        let mut connections = self.connections.write().await;
        let initial = connections.len();
        connections.retain(|(_, server), _| server != server_id);
        Ok((initial - connections.len()) as u64)
    }
}

/// A message handed to a server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub server_id: ServerId,
    pub user_id: UserId,
    pub notification: Notification,
}

/// Records deliveries; servers can be marked unreachable.
#[derive(Default)]
pub struct InMemoryServerMessenger {
    deliveries: RwLock<Vec<Delivery>>,
    unreachable: RwLock<HashSet<ServerId>>,
}

impl InMemoryServerMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_unreachable(&self, server_id: ServerId) {
        self.unreachable.write().await.insert(server_id);
    }

    pub async fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries.read().await.clone()
    }

    pub async fn deliveries_to(&self, user_id: &UserId) -> Vec<Delivery> {
        self.deliveries
            .read()
            .await
            .iter()
            .filter(|d| &d.user_id == user_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ServerMessenger for InMemoryServerMessenger {
    async fn send_to_server(
        &self,
        server_id: &ServerId,
        user_id: &UserId,
        notification: &Notification,
    ) -> Result<(), ConnectionRegistryError> {
        if self.unreachable.read().await.contains(server_id) {
            return Err(ConnectionRegistryError::Unreachable(server_id.clone()));
        }
        self.deliveries.write().await.push(Delivery {
            server_id: server_id.clone(),
            user_id: user_id.clone(),
            notification: notification.clone(),
        });
        Ok(())
    }
}
