// Result cache backends
pub mod adapter;
pub mod memory;
pub mod redis;

pub use adapter::CacheLayer;
pub use memory::{CacheStats, MemoryCache};
pub use self::redis::RedisCache;
