use serde::Deserialize;
use std::env;
use std::path::Path;
use std::time::Duration;
use url::Url;

use crate::error::AppError;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub store: StoreConfig,
    pub cache: CacheConfig,
    pub logging: LoggingConfig,
}

/// Connection descriptor for the relational backing store
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub dbname: String,
    pub sslmode: String,
    pub query_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    pub addr: String,
    pub password: Option<String>,
    pub db: i64,
    pub ttl_secs: u64,
    /// Fail the request when the write-back fails
    pub strict_writes: bool,
    /// Surface undecodable cached payloads instead of re-querying
    pub strict_payloads: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Config {
    /// Load defaults, then an optional config file, then environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        // Try to load from .env file
        let _ = dotenv::dotenv();

        let mut builder = config::Config::builder()
            .set_default("store.host", "localhost")?
            .set_default("store.port", 5432)?
            .set_default("store.user", "postgres")?
            .set_default("store.password", "")?
            .set_default("store.dbname", "demo")?
            .set_default("store.sslmode", "disable")?
            .set_default("store.query_timeout_secs", 30)?
            .set_default("cache.addr", "localhost:6379")?
            .set_default("cache.db", 0)?
            .set_default("cache.ttl_secs", 300)?
            .set_default("cache.strict_writes", false)?
            .set_default("cache.strict_payloads", false)?
            .set_default("logging.level", "warn")?;

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }

        // Load from environment variables
        let overrides = [
            ("DB_HOST", "store.host"),
            ("DB_PORT", "store.port"),
            ("DB_USER", "store.user"),
            ("DB_PASSWORD", "store.password"),
            ("DB_NAME", "store.dbname"),
            ("DB_SSLMODE", "store.sslmode"),
            ("DB_QUERY_TIMEOUT_SECS", "store.query_timeout_secs"),
            ("REDIS_ADDR", "cache.addr"),
            ("REDIS_DB", "cache.db"),
            ("CACHE_TTL_SECS", "cache.ttl_secs"),
            ("CACHE_STRICT_WRITES", "cache.strict_writes"),
            ("CACHE_STRICT_PAYLOADS", "cache.strict_payloads"),
            ("RUST_LOG", "logging.level"),
        ];
        for (var, key) in overrides {
            if let Ok(value) = env::var(var) {
                builder = builder.set_override(key, value)?;
            }
        }

        if let Ok(password) = env::var("REDIS_PASSWORD") {
            if !password.is_empty() {
                builder = builder.set_override("cache.password", Some(password))?;
            }
        }

        builder.build()?.try_deserialize()
    }
}

impl StoreConfig {
    /// Whether the configured sslmode can be served without a TLS connector
    pub fn plaintext_allowed(&self) -> bool {
        matches!(self.sslmode.as_str(), "disable" | "allow" | "prefer")
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    /// Redis connection URL, e.g. `redis://:secret@localhost:6379/0`
    pub fn redis_url(&self) -> Result<String, AppError> {
        let mut url = Url::parse(&format!("redis://{}/{}", self.addr, self.db))
            .map_err(|e| AppError::Config(format!("Invalid cache address {}: {}", self.addr, e)))?;
        if let Some(password) = self.password.as_deref() {
            url.set_password(Some(password))
                .map_err(|_| AppError::Config(format!("Cannot set password on {}", self.addr)))?;
        }
        Ok(url.to_string())
    }
}
