//! Key namespacing

use crate::domain::CacheError;

/// Namespace prefix prepended to every logical key before it reaches the
/// store.
///
/// Namespacing is plain concatenation (`prefix + key`), not path separation:
/// the facade inserts no delimiter. Callers that want one put it in the
/// prefix itself (e.g. `"user:"`), and callers must avoid prefix collisions
/// on their own - `"user"` and `"users"` prefixes can shadow each other.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyNamespace {
    prefix: String,
}

impl KeyNamespace {
    /// Creates a namespace with the given prefix. An empty prefix means
    /// "no namespacing".
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Returns the prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Applies the namespace to a logical key.
    pub fn apply(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    /// Applies the namespace and rejects an empty result.
    ///
    /// Note that with a non-empty prefix an empty logical key is accepted:
    /// the emptiness rule is evaluated after namespacing.
    pub fn require(&self, key: &str) -> Result<String, CacheError> {
        let namespaced = self.apply(key);

        if namespaced.is_empty() {
            Err(CacheError::EmptyKeyOrValue)
        } else {
            Ok(namespaced)
        }
    }
}
