//! Redis cache implementation

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, ConnectionAddr, ConnectionInfo, RedisConnectionInfo};
use tracing::{debug, error, info};

use crate::domain::CacheError;
use crate::domain::cache::{Cache, KeyNamespace};

/// Keys requested per SCAN round-trip.
const SCAN_BATCH_SIZE: usize = 100;

/// Configuration for the Redis cache
#[derive(Debug, Clone)]
pub struct RedisCacheConfig {
    /// Redis host
    pub host: String,
    /// Redis port
    pub port: u16,
    /// Optional authentication credential
    pub password: Option<String>,
    /// Logical database index
    pub db: i64,
    /// Key prefix for namespacing; empty means no namespacing
    pub key_prefix: String,
}

impl Default for RedisCacheConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 6379,
            password: None,
            db: 0,
            key_prefix: String::new(),
        }
    }
}

impl RedisCacheConfig {
    /// Creates a new configuration for the given address
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
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

    /// Sets the key prefix
    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    fn connection_info(&self) -> ConnectionInfo {
        ConnectionInfo {
            addr: ConnectionAddr::Tcp(self.host.clone(), self.port),
            redis: RedisConnectionInfo {
                db: self.db,
                password: self.password.clone(),
                ..Default::default()
            },
        }
    }
}

/// Cursor state for one SCAN traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    /// The server-side cursor is live and positioned.
    Active { cursor: u64 },
    /// The cursor returned to the start sentinel; enumeration is complete.
    Exhausted,
    /// A round-trip failed; the scan cannot be resumed.
    Errored,
}

/// Lazy server-side enumeration of keys matching a wildcard pattern.
///
/// Drives the SCAN cursor protocol: starts at cursor 0 and is exhausted when
/// the server hands the cursor back at 0. Keys inserted by concurrent
/// writers while the scan is in flight may or may not be observed.
#[derive(Debug)]
struct PatternScan {
    pattern: String,
    state: ScanState,
}

impl PatternScan {
    fn new(pattern: String) -> Self {
        Self {
            pattern,
            state: ScanState::Active { cursor: 0 },
        }
    }

    /// Returns the next batch of matching keys, or `None` once the cursor is
    /// exhausted. A batch may be empty; that does not signal exhaustion.
    async fn next_batch(
        &mut self,
        conn: &mut ConnectionManager,
    ) -> Result<Option<Vec<String>>, CacheError> {
        let ScanState::Active { cursor } = self.state else {
            return Ok(None);
        };

        let reply: Result<(u64, Vec<String>), redis::RedisError> = redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(&self.pattern)
            .arg("COUNT")
            .arg(SCAN_BATCH_SIZE)
            .query_async(conn)
            .await;

        match reply {
            Ok((next_cursor, keys)) => {
                self.state = if next_cursor == 0 {
                    ScanState::Exhausted
                } else {
                    ScanState::Active {
                        cursor: next_cursor,
                    }
                };
                Ok(Some(keys))
            }
            Err(e) => {
                self.state = ScanState::Errored;
                Err(e.into())
            }
        }
    }
}

/// Namespaced cache facade over a remote Redis store.
///
/// Construction probes connectivity before a handle is handed out; all
/// subsequent operations are single awaited round-trips on a shared
/// [`ConnectionManager`], which is safe for concurrent use. The facade adds
/// no timeouts, retries or circuit-breaking of its own.
#[derive(Clone)]
pub struct RedisCache {
    connection: ConnectionManager,
    namespace: KeyNamespace,
    config: RedisCacheConfig,
}

impl fmt::Debug for RedisCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisCache")
            .field("config", &self.config)
            .field("connection", &"<ConnectionManager>")
            .finish()
    }
}

impl RedisCache {
    /// Connects to Redis and probes the connection with PING.
    ///
    /// No handle is returned unless the probe succeeds, so a returned cache
    /// is known reachable at construction time. On failure this returns
    /// [`CacheError::Connect`]; whether that is fatal is the composition
    /// root's decision, not this crate's.
    pub async fn connect(config: RedisCacheConfig) -> Result<Self, CacheError> {
        info!(host = %config.host, port = config.port, db = config.db, "connecting to redis");

        let client = Client::open(config.connection_info()).map_err(CacheError::Connect)?;

        let mut connection = ConnectionManager::new(client).await.map_err(|e| {
            error!(error = %e, "failed to connect to redis");
            CacheError::Connect(e)
        })?;

        if let Err(e) = redis::cmd("PING").query_async::<()>(&mut connection).await {
            error!(error = %e, "redis connectivity probe failed");
            return Err(CacheError::Connect(e));
        }

        info!("redis connection established");

        Ok(Self {
            namespace: KeyNamespace::new(config.key_prefix.clone()),
            connection,
            config,
        })
    }

    /// The namespace applied to every key this handle touches.
    pub fn namespace(&self) -> &KeyNamespace {
        &self.namespace
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get_raw(&self, key: &str) -> Result<Option<String>, CacheError> {
        let key = self.namespace.require(key)?;
        let mut conn = self.connection.clone();

        let result: Option<String> = conn.get(&key).await?;

        Ok(result)
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
        let mut conn = self.connection.clone();

        match ttl {
            Some(ttl) if !ttl.is_zero() => {
                let ttl_secs = ttl.as_secs().max(1);
                let _: () = conn.set_ex(&key, value, ttl_secs).await?;
            }
            // None and zero both mean "no expiry"
            _ => {
                let _: () = conn.set(&key, value).await?;
            }
        }

        Ok(())
    }

    async fn delete(&self, keys: &[&str]) -> Result<usize, CacheError> {
        if keys.is_empty() {
            return Ok(0);
        }

        let keys: Vec<String> = keys.iter().map(|k| self.namespace.apply(k)).collect();
        let mut conn = self.connection.clone();

        let removed: usize = conn.del(&keys).await?;

        Ok(removed)
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<u64, CacheError> {
        let pattern = self.namespace.apply(pattern);
        let mut conn = self.connection.clone();

        let mut scan = PatternScan::new(pattern.clone());
        let mut deleted = 0u64;

        // Not transactional: a failed scan or delete aborts the loop, and
        // keys removed before the failure stay removed.
        while let Some(keys) = scan.next_batch(&mut conn).await? {
            for key in keys {
                let removed: u64 = conn.del(&key).await?;
                deleted += removed;
            }
        }

        debug!(pattern = %pattern, deleted, "pattern delete finished");

        Ok(deleted)
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        // The empty-key precondition maps to "absent"; store failures are
        // propagated, never folded into false.
        let Ok(key) = self.namespace.require(key) else {
            return Ok(false);
        };
        let mut conn = self.connection.clone();

        let exists: bool = conn.exists(&key).await?;

        Ok(exists)
    }

    async fn increment(&self, key: &str, delta: i64) -> Result<i64, CacheError> {
        let key = self.namespace.apply(key);
        let mut conn = self.connection.clone();

        let new_value: i64 = conn.incr(&key, delta).await?;

        Ok(new_value)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, CacheError> {
        let key = self.namespace.apply(key);
        let mut conn = self.connection.clone();

        let ttl_secs = ttl.as_secs().max(1) as i64;

        let updated: bool = conn.expire(&key, ttl_secs).await?;

        Ok(updated)
    }

    async fn ttl(&self, key: &str) -> Result<Option<Duration>, CacheError> {
        let key = self.namespace.apply(key);
        let mut conn = self.connection.clone();

        let ttl_secs: i64 = conn.ttl(&key).await?;

        // Redis returns -2 if the key doesn't exist, -1 if it has no TTL
        if ttl_secs < 0 {
            Ok(None)
        } else {
            Ok(Some(Duration::from_secs(ttl_secs as u64)))
        }
    }
}
