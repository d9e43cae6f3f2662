//! In-memory cache implementation using moka

use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache as MokaCache;
use tracing::debug;

use crate::domain::CacheError;
use crate::domain::cache::{Cache, KeyNamespace};

/// Configuration for the in-memory cache
#[derive(Debug, Clone)]
pub struct InMemoryCacheConfig {
    /// Maximum number of entries
    pub max_capacity: u64,
    /// Key prefix for namespacing; empty means no namespacing
    pub key_prefix: String,
}

impl Default for InMemoryCacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: 10_000,
            key_prefix: String::new(),
        }
    }
}

impl InMemoryCacheConfig {
    /// Sets the maximum capacity
    pub fn with_max_capacity(mut self, capacity: u64) -> Self {
        self.max_capacity = capacity;
        self
    }

    /// Sets the key prefix
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }
}

/// Cache entry stored in moka
#[derive(Debug, Clone)]
struct CacheEntry {
    /// Stored string value
    data: String,
    /// Expiration timestamp in millis since epoch; `None` means no expiry
    expires_at: Option<u64>,
}

/// In-memory implementation of the cache facade, backed by moka.
///
/// Behaves like the Redis facade (namespacing, TTLs, wildcard deletion) with
/// the store living in-process, which makes it a drop-in test double and a
/// local fallback. Cloning shares the underlying store; see
/// [`InMemoryCache::handle_with_prefix`] for building differently-namespaced
/// handles over one store.
#[derive(Debug, Clone)]
pub struct InMemoryCache {
    entries: MokaCache<String, CacheEntry>,
    namespace: KeyNamespace,
}

impl InMemoryCache {
    /// Creates a new in-memory cache with default configuration
    pub fn new() -> Self {
        Self::with_config(InMemoryCacheConfig::default())
    }

    /// Creates a new in-memory cache with the given configuration
    pub fn with_config(config: InMemoryCacheConfig) -> Self {
        Self {
            entries: MokaCache::builder()
                .max_capacity(config.max_capacity)
                .build(),
            namespace: KeyNamespace::new(config.key_prefix),
        }
    }

    /// Returns a handle over the *same* physical store with a different
    /// namespace prefix, mirroring several Redis facades sharing one server.
    pub fn handle_with_prefix(&self, prefix: impl Into<String>) -> Self {
        Self {
            entries: self.entries.clone(),
            namespace: KeyNamespace::new(prefix),
        }
    }

    fn current_time_millis() -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }

    fn is_expired(entry: &CacheEntry) -> bool {
        entry
            .expires_at
            .is_some_and(|at| Self::current_time_millis() > at)
    }

    fn expires_at(ttl: Option<Duration>) -> Option<u64> {
        match ttl {
            Some(ttl) if !ttl.is_zero() => {
                Some(Self::current_time_millis() + ttl.as_millis() as u64)
            }
            // None and zero both mean "no expiry"
            _ => None,
        }
    }

    /// Live entry lookup; lazily drops an expired entry it runs into.
    async fn live_entry(&self, key: &str) -> Option<CacheEntry> {
        match self.entries.get(key).await {
            Some(entry) if Self::is_expired(&entry) => {
                self.entries.remove(key).await;
                None
            }
            other => other,
        }
    }
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Cache for InMemoryCache {
    async fn get_raw(&self, key: &str) -> Result<Option<String>, CacheError> {
        let key = self.namespace.require(key)?;

        Ok(self.live_entry(&key).await.map(|entry| entry.data))
    }

    async fn set_raw(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        let key = self.namespace.require(key)?;
        if value.is_empty() {
            return Err(CacheError::EmptyKeyOrValue);
        }

        let entry = CacheEntry {
            data: value.to_string(),
            expires_at: Self::expires_at(ttl),
        };

        self.entries.insert(key, entry).await;
        Ok(())
    }

    async fn delete(&self, keys: &[&str]) -> Result<usize, CacheError> {
        let mut removed = 0;

        for key in keys {
            let key = self.namespace.apply(key);
            if self.live_entry(&key).await.is_some() {
                self.entries.remove(&key).await;
                removed += 1;
            }
        }

        Ok(removed)
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<u64, CacheError> {
        let pattern = self.namespace.apply(pattern);
        let pattern_regex = format!("^{}$", regex::escape(&pattern).replace(r"\*", ".*"));
        let regex = regex::Regex::new(&pattern_regex)
            .map_err(|e| CacheError::invalid_pattern(e.to_string()))?;

        // Sync pending tasks first so iteration sees recent writes
        self.entries.run_pending_tasks().await;

        let entries = self.entries.clone();
        let keys_to_delete: Vec<String> = tokio::task::spawn_blocking(move || {
            entries
                .iter()
                .filter_map(|(k, _)| {
                    let key: &str = k.as_ref();
                    regex.is_match(key).then(|| key.to_string())
                })
                .collect()
        })
        .await
        .map_err(|e| CacheError::invalid_pattern(format!("failed to iterate cache: {}", e)))?;

        let mut deleted = 0;
        for key in keys_to_delete {
            self.entries.remove(&key).await;
            deleted += 1;
        }

        debug!(pattern = %pattern, deleted, "pattern delete finished");

        Ok(deleted)
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        let Ok(key) = self.namespace.require(key) else {
            return Ok(false);
        };

        Ok(self.live_entry(&key).await.is_some())
    }

    async fn increment(&self, key: &str, delta: i64) -> Result<i64, CacheError> {
        let key = self.namespace.apply(key);

        // Missing keys count as 0; the entry's expiry survives the update,
        // matching INCRBY.
        let entry = self.live_entry(&key).await;
        let current: i64 = match &entry {
            Some(entry) => entry.data.parse()?,
            None => 0,
        };

        let new_value = current + delta;
        self.entries
            .insert(
                key,
                CacheEntry {
                    data: new_value.to_string(),
                    expires_at: entry.and_then(|e| e.expires_at),
                },
            )
            .await;

        Ok(new_value)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, CacheError> {
        let key = self.namespace.apply(key);

        match self.live_entry(&key).await {
            Some(entry) => {
                self.entries
                    .insert(
                        key,
                        CacheEntry {
                            data: entry.data,
                            expires_at: Self::expires_at(Some(ttl)),
                        },
                    )
                    .await;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, CacheError> {
        let key = self.namespace.apply(key);

        match self.live_entry(&key).await {
            Some(CacheEntry {
                expires_at: Some(at),
                ..
            }) => {
                let now = Self::current_time_millis();
                Ok(Some(Duration::from_millis(at.saturating_sub(now))))
            }
            _ => Ok(None),
        }
    }
}
