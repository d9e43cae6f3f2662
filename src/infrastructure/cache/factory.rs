//! Cache factory for runtime backend selection

use std::sync::Arc;

use tracing::info;

use crate::domain::CacheError;
use crate::domain::cache::Cache;

use super::in_memory::{InMemoryCache, InMemoryCacheConfig};
use super::redis::{RedisCache, RedisCacheConfig};

/// Supported cache backends
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CacheBackend {
    /// In-memory cache using moka
    #[default]
    InMemory,
    /// Redis cache
    Redis,
}

impl std::fmt::Display for CacheBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheBackend::InMemory => write!(f, "in_memory"),
            CacheBackend::Redis => write!(f, "redis"),
        }
    }
}

impl std::str::FromStr for CacheBackend {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "in_memory" | "inmemory" | "memory" => Ok(CacheBackend::InMemory),
            "redis" => Ok(CacheBackend::Redis),
            _ => Err(CacheError::configuration(format!(
                "unknown cache backend: {}. Valid backends: in_memory, redis",
                s
            ))),
        }
    }
}

/// Configuration for the cache factory
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Backend to create
    pub backend: CacheBackend,
    /// Redis host (Redis backend)
    pub host: String,
    /// Redis port (Redis backend)
    pub port: u16,
    /// Optional authentication credential (Redis backend)
    pub password: Option<String>,
    /// Logical database index (Redis backend)
    pub db: i64,
    /// Key prefix for namespacing, applied by either backend
    pub key_prefix: String,
    /// Maximum number of entries (in-memory backend)
    pub max_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::InMemory,
            host: "127.0.0.1".to_string(),
            port: 6379,
            password: None,
            db: 0,
            key_prefix: String::new(),
            max_capacity: 10_000,
        }
    }
}

impl CacheConfig {
    /// Creates a configuration for the in-memory backend
    pub fn in_memory() -> Self {
        Self {
            backend: CacheBackend::InMemory,
            ..Default::default()
        }
    }

    /// Creates a configuration for the Redis backend
    pub fn redis(host: impl Into<String>, port: u16) -> Self {
        Self {
            backend: CacheBackend::Redis,
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    /// Sets the key prefix
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    /// Sets the authentication credential
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Sets the logical database index
    pub fn with_db(mut self, db: i64) -> Self {
        self.db = db;
        self
    }

    /// Sets the maximum capacity (in-memory only)
    pub fn with_max_capacity(mut self, capacity: u64) -> Self {
        self.max_capacity = capacity;
        self
    }

    /// Creates config from environment variables
    pub fn from_env() -> Result<Self, CacheError> {
        let backend = std::env::var("CACHE_BACKEND")
            .unwrap_or_else(|_| "in_memory".to_string())
            .parse()?;

        let host = std::env::var("REDIS_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

        let port = match std::env::var("REDIS_PORT") {
            Ok(v) => v
                .parse()
                .map_err(|_| CacheError::configuration(format!("invalid REDIS_PORT: {}", v)))?,
            Err(_) => 6379,
        };

        let db = match std::env::var("REDIS_DB") {
            Ok(v) => v
                .parse()
                .map_err(|_| CacheError::configuration(format!("invalid REDIS_DB: {}", v)))?,
            Err(_) => 0,
        };

        let password = std::env::var("REDIS_PASSWORD").ok();
        let key_prefix = std::env::var("CACHE_KEY_PREFIX").unwrap_or_default();

        let max_capacity = std::env::var("CACHE_MAX_CAPACITY")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(10_000);

        Ok(Self {
            backend,
            host,
            port,
            password,
            db,
            key_prefix,
            max_capacity,
        })
    }
}

/// Factory for creating cache instances
#[derive(Debug, Default)]
pub struct CacheFactory;

impl CacheFactory {
    /// Creates a new cache factory
    pub fn new() -> Self {
        Self
    }

    /// Creates a cache instance for the configured backend.
    ///
    /// For the Redis backend this performs the connectivity probe, so a
    /// returned cache is known reachable.
    pub async fn create(&self, config: &CacheConfig) -> Result<Arc<dyn Cache>, CacheError> {
        info!(backend = %config.backend, "creating cache");

        match config.backend {
            CacheBackend::InMemory => {
                let in_memory_config = InMemoryCacheConfig::default()
                    .with_max_capacity(config.max_capacity)
                    .with_key_prefix(config.key_prefix.clone());

                Ok(Arc::new(InMemoryCache::with_config(in_memory_config)))
            }
            CacheBackend::Redis => {
                let mut redis_config = RedisCacheConfig::new(config.host.clone(), config.port)
                    .with_db(config.db)
                    .with_key_prefix(config.key_prefix.clone());

                if let Some(password) = &config.password {
                    redis_config = redis_config.with_password(password.clone());
                }

                let cache = RedisCache::connect(redis_config).await?;
                Ok(Arc::new(cache))
            }
        }
    }

    /// Creates an in-memory cache with default settings
    pub fn create_in_memory(&self) -> Arc<dyn Cache> {
        Arc::new(InMemoryCache::new())
    }
}
