use std::time::Duration;

use async_trait::async_trait;

use crate::Result;

/// Default lifetime of a cached entry.
pub const DEFAULT_TTL: Duration = Duration::from_secs(30 * 60);

/// Upper bound on the lifetime of views that embed stock counts.
///
/// A read that started before a write commits can store its snapshot after
/// the write invalidated the key. That stale entry lives at most this long.
pub const STOCK_VIEW_TTL: Duration = Duration::from_secs(60);

/// Core trait for key-value cache backends.
///
/// Values are opaque strings; `ReadThrough` handles encoding.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Returns the value stored under `key`, if present and unexpired.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Stores `value` under `key` for `ttl`.
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()>;

    /// Removes `key`. Removing a missing key succeeds.
    async fn delete(&self, key: &str) -> Result<()>;
}
