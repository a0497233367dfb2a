//! ConnectionRegistry port - Which server holds a user's realtime connection.
//!
//! Realtime connections live on specific server instances. The registry is an
//! injected service with its own lifecycle: servers register users as they
//! connect, refresh them with heartbeats, and clean up on shutdown. The push
//! notifier looks users up here and hands the message to a `ServerMessenger`
//! for the server that owns the connection.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::UserId;

use super::Notification;

/// Identifier of a server instance, typically `hostname:port` or a pod name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ServerId(String);

impl ServerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ServerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Errors from registry or messenger operations.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionRegistryError {
    /// Redis communication error
    #[error("Redis error: {0}")]
    Redis(String),

    /// The target server is not listening
    #[error("Server {0} is unreachable")]
    Unreachable(ServerId),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Tracks realtime connections across server instances.
///
/// Entries expire if they are not refreshed, so a crashed server's users
/// disappear on their own.
#[async_trait]
pub trait ConnectionRegistry: Send + Sync {
    /// Record that `user_id` is connected to `server_id`.
    async fn register(
        &self,
        user_id: &UserId,
        server_id: &ServerId,
    ) -> Result<(), ConnectionRegistryError>;

    /// Remove one connection.
    async fn unregister(
        &self,
        user_id: &UserId,
        server_id: &ServerId,
    ) -> Result<(), ConnectionRegistryError>;

    /// Servers holding live connections for the user. Empty if none.
    async fn find_servers(&self, user_id: &UserId)
        -> Result<Vec<ServerId>, ConnectionRegistryError>;

    /// True if the user has at least one live connection.
    async fn is_connected(&self, user_id: &UserId) -> Result<bool, ConnectionRegistryError> {
        Ok(!self.find_servers(user_id).await?.is_empty())
    }

    /// Extend the lifetime of a connection.
    async fn heartbeat(
        &self,
        user_id: &UserId,
        server_id: &ServerId,
    ) -> Result<(), ConnectionRegistryError>;

    /// Remove every connection held by a server. Returns how many were removed.
    async fn cleanup_server(&self, server_id: &ServerId) -> Result<u64, ConnectionRegistryError>;
}

/// Delivers a message to one server for one of its connected users.
#[async_trait]
pub trait ServerMessenger: Send + Sync {
    async fn send_to_server(
        &self,
        server_id: &ServerId,
        user_id: &UserId,
        notification: &Notification,
    ) -> Result<(), ConnectionRegistryError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_id_display() {
        let server_id = ServerId::new("relay-1:8080");
        assert_eq!(format!("{}", server_id), "relay-1:8080");
    }

    #[test]
    fn unreachable_error_names_server() {
        let err = ConnectionRegistryError::Unreachable("node-b".into());
        assert_eq!(err.to_string(), "Server node-b is unreachable");
    }
}
