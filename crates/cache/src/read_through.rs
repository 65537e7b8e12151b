//! Read-through caching that never fails the caller.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::{Cache, DEFAULT_TTL, STOCK_VIEW_TTL};

/// Wraps a cache backend with the read-through policy.
///
/// Cache failures (unreachable server, undecodable entry) are logged and
/// bypassed: the value is computed from the backing store instead.
#[derive(Clone)]
pub struct ReadThrough {
    cache: Arc<dyn Cache>,
    ttl: Duration,
}

impl ReadThrough {
    /// Creates a read-through wrapper using the default TTL.
    pub fn new(cache: Arc<dyn Cache>) -> Self {
        Self {
            cache,
            ttl: DEFAULT_TTL,
        }
    }

    /// Sets the TTL used by `get_or_compute`.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Returns the configured TTL.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns the cached value for `key`, or computes, stores and returns it.
    ///
    /// Errors from `compute` are returned to the caller and nothing is cached.
    pub async fn get_or_compute<T, E, F, Fut>(&self, key: &str, compute: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.get_or_compute_with_ttl(key, self.ttl, compute).await
    }

    /// Like `get_or_compute` for views that carry stock counts. The entry
    /// expires after the configured TTL or `STOCK_VIEW_TTL`, whichever is
    /// shorter.
    pub async fn get_or_compute_stock_view<T, E, F, Fut>(
        &self,
        key: &str,
        compute: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.get_or_compute_with_ttl(key, self.ttl.min(STOCK_VIEW_TTL), compute)
            .await
    }

    /// Like `get_or_compute`, with an explicit TTL.
    pub async fn get_or_compute_with_ttl<T, E, F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        compute: F,
    ) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        match self.cache.get(key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => {
                    metrics::counter!("cache_hits_total").increment(1);
                    return Ok(value);
                }
                Err(e) => {
                    metrics::counter!("cache_errors_total").increment(1);
                    tracing::warn!(key, error = %e, "discarding undecodable cache entry");
                }
            },
            Ok(None) => {
                metrics::counter!("cache_misses_total").increment(1);
            }
            Err(e) => {
                metrics::counter!("cache_errors_total").increment(1);
                tracing::warn!(key, error = %e, "cache read failed, reading through to store");
            }
        }

        let value = compute().await?;

        match serde_json::to_string(&value) {
            Ok(raw) => {
                if let Err(e) = self.cache.set(key, raw, ttl).await {
                    metrics::counter!("cache_errors_total").increment(1);
                    tracing::warn!(key, error = %e, "cache write failed");
                }
            }
            Err(e) => tracing::warn!(key, error = %e, "value not cacheable"),
        }

        Ok(value)
    }

    /// Removes `key`. Failures are logged, never returned.
    pub async fn invalidate(&self, key: &str) {
        if let Err(e) = self.cache.delete(key).await {
            metrics::counter!("cache_errors_total").increment(1);
            tracing::warn!(key, error = %e, "cache invalidation failed");
        }
    }

    /// Removes several keys.
    pub async fn invalidate_all<I, K>(&self, keys: I)
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        for key in keys {
            self.invalidate(key.as_ref()).await;
        }
    }
}
