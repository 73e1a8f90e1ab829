//! Redis backed state store.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, IntoConnectionInfo};
use tracing::info;

use crate::error::StoreError;
use crate::ratelimit::{CounterRecord, StateStore};

/// A [`StateStore`] keeping one JSON encoded record per identity key.
///
/// Records are written without expiry; the cleanup sweeper bounds growth.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore").finish_non_exhaustive()
    }
}

impl RedisStore {
    /// Connect using `info` (a URL or [`redis::ConnectionInfo`]) and verify
    /// the server answers a `PING`.
    pub async fn connect<T: IntoConnectionInfo>(info: T) -> Result<Self, StoreError> {
        let client = redis::Client::open(info)?;
        let mut conn = client.get_connection_manager().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;

        info!("Connected to Redis");
        Ok(Self::with_connection(conn))
    }

    /// Wrap an existing connection manager.
    pub fn with_connection(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl StateStore for RedisStore {
    async fn get(&self, key: &str) -> Result<CounterRecord, StoreError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(key).await?;
        let raw = raw.ok_or_else(|| StoreError::NotFound(key.to_string()))?;
        Ok(serde_json::from_str(&raw)?)
    }

    async fn save(&self, record: &CounterRecord) -> Result<(), StoreError> {
        let body = serde_json::to_string(record)?;
        let mut conn = self.conn.clone();
        conn.set::<_, _, ()>(&record.key, body).await?;
        Ok(())
    }

    async fn list_keys(&self) -> Result<Vec<String>, StoreError> {
        let mut conn = self.conn.clone();
        Ok(conn.keys("*").await?)
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key).await?;
        Ok(())
    }
}
