// Cache layer trait: single-key get/set with expiry
use crate::error::AppError;
use std::time::Duration;

/// Key-value store for serialized query results
///
/// A missing or expired key is `Ok(None)`, never an error.
#[async_trait::async_trait]
pub trait CacheLayer: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, AppError>;

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), AppError>;

    /// Release the underlying connection
    async fn close(&self);
}
