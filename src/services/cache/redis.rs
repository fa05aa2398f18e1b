// Redis cache backend over a tokio connection manager
use crate::config::CacheConfig;
use crate::error::AppError;
use crate::services::cache::adapter::CacheLayer;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;

pub struct RedisCache {
    manager: ConnectionManager,
}

impl RedisCache {
    /// Open the connection and verify the server answers
    pub async fn connect(config: &CacheConfig) -> Result<Self, AppError> {
        let client = redis::Client::open(config.redis_url()?)
            .map_err(|e| AppError::Connection(format!("Invalid cache address {}: {}", config.addr, e)))?;

        let manager = ConnectionManager::new(client)
            .await
            .map_err(|e| AppError::Connection(format!("Failed to connect to cache at {}: {}", config.addr, e)))?;

        let cache = Self { manager };
        cache.ping().await?;

        tracing::info!("Connected to cache at {} (db {})", config.addr, config.db);
        Ok(cache)
    }

    async fn ping(&self) -> Result<(), AppError> {
        let mut conn = self.manager.clone();
        let _pong: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| AppError::Connection(format!("Cache did not answer PING: {}", e)))?;
        Ok(())
    }
}

/// TTL as a `PX` argument: at least 1 ms (`PX 0` is rejected) and at most
/// the server's signed 64-bit limit
fn px_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis())
        .unwrap_or(u64::MAX)
        .clamp(1, i64::MAX as u64)
}

#[async_trait::async_trait]
impl CacheLayer for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        let mut conn = self.manager.clone();
        let value: Option<String> = conn
            .get(key)
            .await
            .map_err(|e| AppError::Cache(format!("Failed to check cache: {}", e)))?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), AppError> {
        let millis = px_millis(ttl);
        let mut conn = self.manager.clone();
        let _: () = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("PX")
            .arg(millis)
            .query_async(&mut conn)
            .await
            .map_err(|e| AppError::Cache(format!("Failed to save to cache: {}", e)))?;
        Ok(())
    }

    async fn close(&self) {
        // The manager disconnects once its last clone is dropped
        tracing::debug!("Releasing cache connection");
    }
}
