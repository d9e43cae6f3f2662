//! Cache trait definition

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};

use crate::domain::CacheError;

/// Namespaced key-value cache over a store that only understands strings.
///
/// The trait works on raw strings to stay dyn-compatible; [`CacheExt`] layers
/// typed operations on top. Implementations apply their namespace prefix to
/// every key before it reaches the store, and enforce the emptiness rule on
/// the namespaced key.
///
/// Values written through `set_raw` and values written through the typed
/// [`CacheExt::set`] use different encodings (raw vs JSON). The store does
/// not tag values with their encoding, so reads must match the encoding of
/// the corresponding write; mixing them is a caller contract violation and
/// yields decode errors or garbage.
#[async_trait]
pub trait Cache: Send + Sync + Debug {
    /// Gets the raw stored string, or `None` if the key is absent.
    ///
    /// Fails with [`CacheError::EmptyKeyOrValue`] when the namespaced key is
    /// empty.
    async fn get_raw(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Stores a raw string, unencoded.
    ///
    /// `ttl` of `None` (or zero) means the key never expires; non-zero TTLs
    /// below one second round up to one second. Fails with
    /// [`CacheError::EmptyKeyOrValue`] when the namespaced key or the value
    /// is empty.
    async fn set_raw(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError>;

    /// Deletes the given keys in one request, returning how many existed.
    async fn delete(&self, keys: &[&str]) -> Result<usize, CacheError>;

    /// Deletes every key matching a wildcard pattern, returning how many
    /// were removed.
    ///
    /// The store has no atomic delete-by-pattern, so this is a scan-then-
    /// delete loop and is **not transactional**: on error the operation
    /// aborts with that error and keys deleted before it stay deleted.
    /// There is also no isolation against concurrent writers; keys inserted
    /// mid-scan may or may not be observed.
    async fn delete_pattern(&self, pattern: &str) -> Result<u64, CacheError>;

    /// Checks whether a key exists.
    ///
    /// An empty namespaced key yields `Ok(false)`. Store failures are
    /// propagated, not folded into `false`; callers that cannot tell
    /// "absent" from "unreachable" apart should not call this.
    async fn exists(&self, key: &str) -> Result<bool, CacheError>;

    /// Atomically adds `delta` to the integer stored at `key` (missing keys
    /// count as 0), returning the new value. Atomicity is the store's.
    async fn increment(&self, key: &str, delta: i64) -> Result<i64, CacheError>;

    /// Replaces the TTL of an existing key. Returns `false` when the key is
    /// absent.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, CacheError>;

    /// Remaining TTL for a key, `None` when the key is absent or has no
    /// expiry.
    async fn ttl(&self, key: &str) -> Result<Option<Duration>, CacheError>;
}

/// Extension trait providing typed get/set operations.
///
/// One codec contract (JSON) covers every value type, scalars included, so a
/// typed write always round-trips through a typed read of the same type.
pub trait CacheExt: Cache {
    /// Stores a value through the JSON codec.
    fn set<'a, V>(
        &'a self,
        key: &'a str,
        value: &'a V,
        ttl: Option<Duration>,
    ) -> impl std::future::Future<Output = Result<(), CacheError>> + Send
    where
        V: Serialize + Send + Sync,
    {
        async move {
            let data = serde_json::to_string(value).map_err(CacheError::Encode)?;
            self.set_raw(key, &data, ttl).await
        }
    }

    /// Gets a value through the JSON codec, decoded into `V`.
    fn get<'a, V>(
        &'a self,
        key: &'a str,
    ) -> impl std::future::Future<Output = Result<Option<V>, CacheError>> + Send
    where
        V: DeserializeOwned + Send,
    {
        async move {
            match self.get_raw(key).await? {
                Some(data) => {
                    let value: V = serde_json::from_str(&data).map_err(CacheError::Decode)?;
                    Ok(Some(value))
                }
                None => Ok(None),
            }
        }
    }

    /// Gets the stored value parsed as a base-10 integer.
    ///
    /// Reads both counters produced by [`Cache::increment`] and integers
    /// written through [`CacheExt::set`] (the encodings coincide).
    fn get_int<'a>(
        &'a self,
        key: &'a str,
    ) -> impl std::future::Future<Output = Result<Option<i64>, CacheError>> + Send {
        async move {
            match self.get_raw(key).await? {
                Some(data) => Ok(Some(data.parse::<i64>()?)),
                None => Ok(None),
            }
        }
    }

    /// Increments a counter by one, returning the new value.
    fn incr<'a>(
        &'a self,
        key: &'a str,
    ) -> impl std::future::Future<Output = Result<i64, CacheError>> + Send {
        async move { self.increment(key, 1).await }
    }
}

// Blanket implementation for all types implementing Cache
impl<T: Cache + ?Sized> CacheExt for T {}

#[cfg(test)]
mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Mock cache for testing, with error injection.
    ///
    /// Applies no namespace; it exercises the trait contract and the typed
    /// extension layer, not prefixing. Each store round-trip (a scan, a
    /// single delete, a get) counts as one operation against the injected
    /// failure budget, so multi-step operations can be failed mid-flight.
    #[derive(Debug, Default)]
    pub struct MockCache {
        entries: Mutex<HashMap<String, (String, Option<Duration>)>>,
        error: Mutex<Option<String>>,
        ops_before_error: Mutex<usize>,
    }

    impl MockCache {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_entry(self, key: &str, value: &str, ttl: Option<Duration>) -> Self {
            self.entries
                .lock()
                .unwrap()
                .insert(key.to_string(), (value.to_string(), ttl));
            self
        }

        /// Fails every operation from now on.
        pub fn with_error(self, error: impl Into<String>) -> Self {
            self.with_error_after(0, error)
        }

        /// Lets `ok_ops` store round-trips succeed, then fails the rest.
        pub fn with_error_after(self, ok_ops: usize, error: impl Into<String>) -> Self {
            *self.error.lock().unwrap() = Some(error.into());
            *self.ops_before_error.lock().unwrap() = ok_ops;
            self
        }

        /// Clears the injected error so a test can inspect leftover state.
        pub fn clear_error(&self) {
            *self.error.lock().unwrap() = None;
        }

        fn check_error(&self) -> Result<(), CacheError> {
            if let Some(error) = self.error.lock().unwrap().clone() {
                let mut remaining = self.ops_before_error.lock().unwrap();
                if *remaining == 0 {
                    return Err(CacheError::configuration(error));
                }
                *remaining -= 1;
            }
            Ok(())
        }
    }

    #[async_trait]
    impl Cache for MockCache {
        async fn get_raw(&self, key: &str) -> Result<Option<String>, CacheError> {
            self.check_error()?;
            if key.is_empty() {
                return Err(CacheError::EmptyKeyOrValue);
            }
            let entries = self.entries.lock().unwrap();

            Ok(entries.get(key).map(|(data, _)| data.clone()))
        }

        async fn set_raw(
            &self,
            key: &str,
            value: &str,
            ttl: Option<Duration>,
        ) -> Result<(), CacheError> {
            self.check_error()?;
            if key.is_empty() || value.is_empty() {
                return Err(CacheError::EmptyKeyOrValue);
            }
            self.entries
                .lock()
                .unwrap()
                .insert(key.to_string(), (value.to_string(), ttl));
            Ok(())
        }

        async fn delete(&self, keys: &[&str]) -> Result<usize, CacheError> {
            self.check_error()?;
            let mut entries = self.entries.lock().unwrap();

            Ok(keys
                .iter()
                .filter(|key| entries.remove(**key).is_some())
                .count())
        }

        async fn delete_pattern(&self, pattern: &str) -> Result<u64, CacheError> {
            // the scan round-trip
            self.check_error()?;

            let pattern_regex = format!("^{}$", regex::escape(pattern).replace(r"\*", ".*"));
            let regex = regex::Regex::new(&pattern_regex)
                .map_err(|e| CacheError::invalid_pattern(e.to_string()))?;

            let mut keys_to_remove: Vec<String> = self
                .entries
                .lock()
                .unwrap()
                .keys()
                .filter(|k| regex.is_match(k))
                .cloned()
                .collect();
            // deterministic delete order for mid-flight failure tests
            keys_to_remove.sort();

            let mut deleted = 0;

            for key in keys_to_remove {
                // each key is deleted with its own round-trip; a failure
                // aborts the sweep and leaves earlier deletes in place
                self.check_error()?;
                self.entries.lock().unwrap().remove(&key);
                deleted += 1;
            }

            Ok(deleted)
        }

        async fn exists(&self, key: &str) -> Result<bool, CacheError> {
            self.check_error()?;
            if key.is_empty() {
                return Ok(false);
            }

            Ok(self.entries.lock().unwrap().contains_key(key))
        }

        async fn increment(&self, key: &str, delta: i64) -> Result<i64, CacheError> {
            self.check_error()?;
            let mut entries = self.entries.lock().unwrap();

            // missing keys count as 0; non-integer values fail, as both
            // real backends do
            let current: i64 = match entries.get(key) {
                Some((data, _)) => data.parse()?,
                None => 0,
            };

            let new_value = current + delta;
            entries.insert(key.to_string(), (new_value.to_string(), None));

            Ok(new_value)
        }

        async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, CacheError> {
            self.check_error()?;
            let mut entries = self.entries.lock().unwrap();

            if let Some((data, _)) = entries.get(key) {
                let data = data.clone();
                entries.insert(key.to_string(), (data, Some(ttl)));
                Ok(true)
            } else {
                Ok(false)
            }
        }

        async fn ttl(&self, key: &str) -> Result<Option<Duration>, CacheError> {
            self.check_error()?;
            let entries = self.entries.lock().unwrap();

            Ok(entries.get(key).and_then(|(_, ttl)| *ttl))
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[tokio::test]
        async fn test_typed_roundtrip() {
            let cache = MockCache::new();
            cache
                .set("key1", &"value1", Some(Duration::from_secs(60)))
                .await
                .unwrap();

            let result: Option<String> = cache.get("key1").await.unwrap();
            assert_eq!(result, Some("value1".to_string()));
        }

        #[tokio::test]
        async fn test_get_missing() {
            let cache = MockCache::new();

            let result: Option<String> = cache.get("missing").await.unwrap();
            assert!(result.is_none());
        }

        #[tokio::test]
        async fn test_struct_roundtrip() {
            #[derive(Debug, PartialEq, serde::Serialize, serde::Deserialize)]
            struct Session {
                user_id: u64,
                roles: Vec<String>,
            }

            let cache = MockCache::new();
            let session = Session {
                user_id: 42,
                roles: vec!["admin".to_string(), "editor".to_string()],
            };

            cache.set("session", &session, None).await.unwrap();

            let loaded: Option<Session> = cache.get("session").await.unwrap();
            assert_eq!(loaded, Some(session));
        }

        #[tokio::test]
        async fn test_empty_key_contracts() {
            let cache = MockCache::new();

            let set = cache.set_raw("", "value", None).await;
            assert!(matches!(set, Err(CacheError::EmptyKeyOrValue)));

            let get = cache.get_raw("").await;
            assert!(matches!(get, Err(CacheError::EmptyKeyOrValue)));

            // exists maps the empty-key precondition to false, never an error
            assert!(!cache.exists("").await.unwrap());
        }

        #[tokio::test]
        async fn test_empty_value_rejected() {
            let cache = MockCache::new();

            let result = cache.set_raw("key", "", None).await;
            assert!(matches!(result, Err(CacheError::EmptyKeyOrValue)));
        }

        #[tokio::test]
        async fn test_get_int_parses_counter() {
            let cache = MockCache::new().with_entry("counter", "10", None);

            assert_eq!(cache.get_int("counter").await.unwrap(), Some(10));
            assert!(cache.get_int("missing").await.unwrap().is_none());
        }

        #[tokio::test]
        async fn test_get_int_rejects_non_integer() {
            let cache = MockCache::new().with_entry("blob", "not-a-number", None);

            let result = cache.get_int("blob").await;
            assert!(matches!(result, Err(CacheError::NotAnInteger(_))));
        }

        #[tokio::test]
        async fn test_increment_and_incr() {
            let cache = MockCache::new().with_entry("counter", "10", None);

            assert_eq!(cache.increment("counter", 5).await.unwrap(), 15);
            assert_eq!(cache.incr("counter").await.unwrap(), 16);
            assert_eq!(cache.incr("counter").await.unwrap(), 17);
            assert_eq!(cache.get_int("counter").await.unwrap(), Some(17));
        }

        #[tokio::test]
        async fn test_decode_error_on_encoding_mismatch() {
            // Raw write, typed read: the caller broke the encoding contract.
            let cache = MockCache::new().with_entry("raw", "plain text", None);

            let result: Result<Option<Vec<u32>>, _> = cache.get("raw").await;
            assert!(matches!(result, Err(CacheError::Decode(_))));
        }

        #[tokio::test]
        async fn test_injected_error_propagates_from_exists() {
            // Store failures must not be folded into `false`.
            let cache = MockCache::new().with_error("connection reset");

            assert!(cache.exists("key").await.is_err());
        }

        #[tokio::test]
        async fn test_delete_counts_existing_only() {
            let cache = MockCache::new()
                .with_entry("a", "1", None)
                .with_entry("b", "2", None);

            let removed = cache.delete(&["a", "b", "missing"]).await.unwrap();
            assert_eq!(removed, 2);
            assert!(!cache.exists("a").await.unwrap());
        }

        #[tokio::test]
        async fn test_delete_pattern() {
            let cache = MockCache::new()
                .with_entry("user:1", "a", None)
                .with_entry("user:2", "b", None)
                .with_entry("order:1", "c", None);

            let deleted = cache.delete_pattern("user:*").await.unwrap();
            assert_eq!(deleted, 2);
            assert!(cache.exists("order:1").await.unwrap());
        }

        #[tokio::test]
        async fn test_delete_pattern_aborts_midway_keeping_partial_state() {
            // Budget of two round-trips: the scan and the delete of the
            // first key succeed, the second delete fails. The sweep is not
            // transactional, so the abort must surface the error while the
            // already-deleted key stays deleted.
            let cache = MockCache::new()
                .with_entry("user:1", "a", None)
                .with_entry("user:2", "b", None)
                .with_entry("order:1", "c", None)
                .with_error_after(2, "connection reset");

            let result = cache.delete_pattern("user:*").await;
            assert!(result.is_err());

            cache.clear_error();
            assert!(!cache.exists("user:1").await.unwrap());
            assert!(cache.exists("user:2").await.unwrap());
            assert!(cache.exists("order:1").await.unwrap());
        }

        #[tokio::test]
        async fn test_delete_pattern_scan_error_deletes_nothing() {
            let cache = MockCache::new()
                .with_entry("user:1", "a", None)
                .with_error("connection reset");

            assert!(cache.delete_pattern("user:*").await.is_err());

            cache.clear_error();
            assert!(cache.exists("user:1").await.unwrap());
        }

        #[tokio::test]
        async fn test_increment_non_integer_fails() {
            let cache = MockCache::new().with_entry("blob", "not-a-number", None);

            assert!(matches!(
                cache.increment("blob", 1).await,
                Err(CacheError::NotAnInteger(_))
            ));
        }

        #[tokio::test]
        async fn test_delete_pattern_escapes_metacharacters() {
            // A dot in the pattern is a literal dot, not "any character".
            let cache = MockCache::new()
                .with_entry("v1.0", "a", None)
                .with_entry("v1x0", "b", None);

            let deleted = cache.delete_pattern("v1.*").await.unwrap();
            assert_eq!(deleted, 1);
            assert!(cache.exists("v1x0").await.unwrap());
        }
    }
}
