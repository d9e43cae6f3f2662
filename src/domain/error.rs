use thiserror::Error;

/// Errors surfaced by cache operations.
///
/// Store and codec failures carry their source unchanged; this crate adds no
/// retry, backoff or extra wrapping. Resilience policy belongs to the store
/// client or to the caller.
#[derive(Debug, Error)]
pub enum CacheError {
    /// A write or read was attempted with an empty namespaced key, or a raw
    /// write with an empty value. Recoverable: fix the input.
    #[error("empty cache key or value")]
    EmptyKeyOrValue,

    /// The connectivity probe failed during construction. A handle is never
    /// returned in this state; composition roots conventionally treat this
    /// as fatal, but that escalation is the caller's choice.
    #[error("failed to connect to cache store: {0}")]
    Connect(#[source] redis::RedisError),

    /// Failure from the backing store, passed through unchanged.
    #[error(transparent)]
    Store(#[from] redis::RedisError),

    /// The value could not be encoded for storage.
    #[error("failed to encode cache value: {0}")]
    Encode(#[source] serde_json::Error),

    /// The stored bytes did not decode as the requested shape.
    #[error("failed to decode cache value: {0}")]
    Decode(#[source] serde_json::Error),

    /// The stored value is not a base-10 integer.
    #[error("stored value is not an integer: {0}")]
    NotAnInteger(#[from] std::num::ParseIntError),

    /// A wildcard pattern could not be compiled by the in-memory matcher.
    #[error("invalid key pattern: {0}")]
    InvalidPattern(String),

    /// Invalid or incomplete cache configuration.
    #[error("invalid cache configuration: {0}")]
    Configuration(String),
}

impl CacheError {
    pub fn invalid_pattern(message: impl Into<String>) -> Self {
        Self::InvalidPattern(message.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Whether this error came out of the construction-time probe.
    pub fn is_connect(&self) -> bool {
        matches!(self, Self::Connect(_))
    }
}
