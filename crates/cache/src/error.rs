use thiserror::Error;

/// Errors that can occur when talking to the cache.
///
/// None of these are ever surfaced to API callers; `ReadThrough` logs them
/// and falls back to the backing store.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The Redis client reported an error.
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// The cache could not be reached.
    #[error("Cache unavailable: {0}")]
    Unavailable(String),

    /// A value could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;
