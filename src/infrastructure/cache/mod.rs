//! Cache infrastructure - backend implementations

mod factory;
mod in_memory;
mod redis;

pub use factory::{CacheBackend, CacheConfig, CacheFactory};
pub use in_memory::{InMemoryCache, InMemoryCacheConfig};
pub use redis::{RedisCache, RedisCacheConfig};
