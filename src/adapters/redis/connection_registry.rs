//! Redis-backed connection registry and server messenger.
//!
//! ## Key layout
//!
//! - `{prefix}user:{user_id}` - sorted set of server ids scored by expiry (unix secs)
//! - `{prefix}server:{server_id}` - set of user ids, used by `cleanup_server`
//! - `{prefix}notify:{server_id}` - pub/sub channel each server listens on
//!
//! Expired members are filtered on read and trimmed lazily, so a crashed
//! server's users disappear once their entries age out.

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::domain::foundation::{Timestamp, UserId};
use crate::ports::{
    ConnectionRegistry, ConnectionRegistryError, Notification, ServerId, ServerMessenger,
};

fn redis_error(e: redis::RedisError) -> ConnectionRegistryError {
    ConnectionRegistryError::Redis(e.to_string())
}

fn unix_now() -> i64 {
    Timestamp::now().as_datetime().timestamp()
}

/// Connection registry shared by every server instance.
#[derive(Clone)]
pub struct RedisConnectionRegistry {
    conn: MultiplexedConnection,
    key_prefix: String,
    ttl: Duration,
}

impl RedisConnectionRegistry {
    pub fn new(conn: MultiplexedConnection, key_prefix: impl Into<String>, ttl: Duration) -> Self {
        Self {
            conn,
            key_prefix: key_prefix.into(),
            ttl,
        }
    }

    fn user_key(&self, user_id: &UserId) -> String {
        format!("{}user:{}", self.key_prefix, user_id)
    }

    fn server_key(&self, server_id: &ServerId) -> String {
        format!("{}server:{}", self.key_prefix, server_id)
    }

    fn ttl_secs(&self) -> i64 {
        self.ttl.as_secs().max(1) as i64
    }
}

#[async_trait]
impl ConnectionRegistry for RedisConnectionRegistry {
    async fn register(
        &self,
        user_id: &UserId,
        server_id: &ServerId,
    ) -> Result<(), ConnectionRegistryError> {
        let user_key = self.user_key(user_id);
        let server_key = self.server_key(server_id);
        let expires_at = unix_now() + self.ttl_secs();

        let mut conn = self.conn.clone();
        redis::pipe()
            .atomic()
            .zadd(&user_key, server_id.as_str(), expires_at)
            .ignore()
            .expire(&user_key, self.ttl_secs())
            .ignore()
            .sadd(&server_key, user_id.as_str())
            .ignore()
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(redis_error)
    }

    async fn unregister(
        &self,
        user_id: &UserId,
        server_id: &ServerId,
    ) -> Result<(), ConnectionRegistryError> {
        let mut conn = self.conn.clone();
        redis::pipe()
            .atomic()
            .zrem(self.user_key(user_id), server_id.as_str())
            .ignore()
            .srem(self.server_key(server_id), user_id.as_str())
            .ignore()
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(redis_error)
    }

    async fn find_servers(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<ServerId>, ConnectionRegistryError> {
        let user_key = self.user_key(user_id);
        let now = unix_now();

        let mut conn = self.conn.clone();
        let _: i64 = conn
            .zrembyscore(&user_key, "-inf", now)
            .await
            .map_err(redis_error)?;
        let servers: Vec<String> = conn
            .zrangebyscore(&user_key, format!("({}", now), "+inf")
            .await
            .map_err(redis_error)?;

        Ok(servers.into_iter().map(ServerId::new).collect())
    }

    async fn heartbeat(
        &self,
        user_id: &UserId,
        server_id: &ServerId,
    ) -> Result<(), ConnectionRegistryError> {
        let user_key = self.user_key(user_id);
        let expires_at = unix_now() + self.ttl_secs();

        let mut conn = self.conn.clone();
        redis::pipe()
            .atomic()
            .cmd("ZADD")
            .arg(&user_key)
            .arg("XX")
            .arg(expires_at)
            .arg(server_id.as_str())
            .ignore()
            .expire(&user_key, self.ttl_secs())
            .ignore()
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(redis_error)
    }

    async fn cleanup_server(&self, server_id: &ServerId) -> Result<u64, ConnectionRegistryError> {
        let server_key = self.server_key(server_id);
        let mut conn = self.conn.clone();

        let users: Vec<String> = conn.smembers(&server_key).await.map_err(redis_error)?;
        let mut pipe = redis::pipe();
        pipe.atomic();
        for user in &users {
            pipe.zrem(format!("{}user:{}", self.key_prefix, user), server_id.as_str())
                .ignore();
        }
        pipe.del(&server_key).ignore();
        pipe.query_async::<_, ()>(&mut conn)
            .await
            .map_err(redis_error)?;

        Ok(users.len() as u64)
    }
}

/// Wire format on a server's notify channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerMessage {
    pub user_id: UserId,
    pub notification: Notification,
}

/// Routes notifications to servers over Redis pub/sub.
#[derive(Clone)]
pub struct RedisServerMessenger {
    conn: MultiplexedConnection,
    key_prefix: String,
}

impl RedisServerMessenger {
    pub fn new(conn: MultiplexedConnection, key_prefix: impl Into<String>) -> Self {
        Self {
            conn,
            key_prefix: key_prefix.into(),
        }
    }

    /// Channel a server subscribes to.
    pub fn channel_for(&self, server_id: &ServerId) -> String {
        format!("{}notify:{}", self.key_prefix, server_id)
    }
}

#[async_trait]
impl ServerMessenger for RedisServerMessenger {
    async fn send_to_server(
        &self,
        server_id: &ServerId,
        user_id: &UserId,
        notification: &Notification,
    ) -> Result<(), ConnectionRegistryError> {
        let message = ServerMessage {
            user_id: user_id.clone(),
            notification: notification.clone(),
        };
        let body = serde_json::to_string(&message)
            .map_err(|e| ConnectionRegistryError::Serialization(e.to_string()))?;

        let mut conn = self.conn.clone();
        let receivers: i64 = conn
            .publish(self.channel_for(server_id), body)
            .await
            .map_err(redis_error)?;

        if receivers == 0 {
            return Err(ConnectionRegistryError::Unreachable(server_id.clone()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::JourneyId;
    use crate::ports::NotificationKind;

    #[test]
    fn server_message_is_camel_case() {
        let message = ServerMessage {
            user_id: UserId::new("u-1").unwrap(),
            notification: Notification {
                kind: NotificationKind::JourneyUpdated,
                journey_id: JourneyId::new(),
                subject: "Journey updated".to_string(),
                body: "A journey you follow changed".to_string(),
            },
        };

        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["userId"], "u-1");
        assert_eq!(json["notification"]["kind"], "journey_updated");
        assert!(json["notification"]["journeyId"].is_string());
    }

    // Registry behaviour against a live server:
    //
    // #[tokio::test]
    // #[ignore] // Run with: REDIS_URL=redis://127.0.0.1/ cargo test -- --ignored
    // async fn register_find_cleanup() {
    //     let client = redis::Client::open(std::env::var("REDIS_URL").unwrap()).unwrap();
    //     let conn = client.get_multiplexed_tokio_connection().await.unwrap();
    //     let registry = RedisConnectionRegistry::new(conn, "test:", Duration::from_secs(30));
    //     // register two servers for one user, find both, cleanup one
    // }
}
