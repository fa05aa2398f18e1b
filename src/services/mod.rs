
pub mod cache; // Result cache backends (Redis, in-memory)
pub mod connection_pool;
pub mod database; // Backing store access
pub mod query_service;
pub mod table_renderer;

pub use cache::{CacheLayer, CacheStats, MemoryCache, RedisCache};
pub use database::{PostgresGateway, StoreGateway};
pub use query_service::*;
pub use table_renderer::*;
