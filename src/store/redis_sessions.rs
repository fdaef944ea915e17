use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use crate::error::{AppError, Result};
use crate::models::session::{SessionKeys, StoredSession};
use crate::store::SessionStore;

/// Sessions kept in Redis under `session:<id>` and expired by TTL.
#[derive(Clone)]
pub struct RedisSessionStore {
    redis: ConnectionManager,
}

impl RedisSessionStore {
    /// Connects and verifies the server answers.
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let mut redis = ConnectionManager::new(client).await?;
        let _: String = redis::cmd("PING").query_async(&mut redis).await?;
        tracing::info!("✅ Redis Connection Manager initialized (pooled)");
        Ok(Self { redis })
    }

    fn key(id: &str) -> String {
        format!("session:{}", id)
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn put_new(&self, id: &str, keys: &SessionKeys, ttl: Duration) -> Result<()> {
        let stored = StoredSession::from(keys);
        let session_json = sonic_rs::to_string(&stored)?;

        // NX makes the write conditional: two handshakes can never share an id.
        let written: Option<String> = redis::cmd("SET")
            .arg(Self::key(id))
            .arg(&session_json)
            .arg("NX")
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async(&mut self.redis.clone())
            .await
            .map_err(|e| {
                tracing::error!("❌ Redis session write failed: {}", e);
                AppError::Redis(e)
            })?;

        if written.is_none() {
            return Err(AppError::Internal("Session id collision".to_string()));
        }

        tracing::debug!("✅ Session saved to Redis (ttl {}s)", ttl.as_secs());
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<SessionKeys>> {
        let session_json: Option<String> = self.redis.clone().get(Self::key(id)).await?;

        match session_json {
            Some(json) => {
                let stored: StoredSession = sonic_rs::from_str(&json)?;
                Ok(Some(SessionKeys::try_from(&stored)?))
            }
            None => Ok(None),
        }
    }

    async fn exists(&self, id: &str) -> Result<bool> {
        let exists: bool = self.redis.clone().exists(Self::key(id)).await?;
        Ok(exists)
    }
}
