//! PMP Cache
//!
//! A namespaced, typed cache facade over Redis:
//! - Automatic key namespacing by prefix so several logical caches can share
//!   one physical store without collisions
//! - Typed values (raw strings, integers, JSON-encoded structs) over a store
//!   that only understands strings
//! - Pattern-based bulk deletion built on the SCAN cursor protocol
//! - Construction-time connectivity probe with a distinct failure category
//!
//! The crate never installs a `tracing` subscriber and never terminates the
//! process; both are composition-root decisions.

pub mod domain;
pub mod infrastructure;

pub use domain::cache::{Cache, CacheExt, KeyNamespace};
pub use domain::CacheError;
pub use infrastructure::cache::{
    CacheBackend, CacheConfig, CacheFactory, InMemoryCache, InMemoryCacheConfig, RedisCache,
    RedisCacheConfig,
};
