//! Key-value cache layer.
//!
//! The cache is advisory: every failure is logged and bypassed so callers
//! fall back to the relational store.

pub mod cache;
pub mod error;
pub mod keys;
pub mod memory;
pub mod read_through;
pub mod redis_cache;

pub use cache::{Cache, DEFAULT_TTL, STOCK_VIEW_TTL};
pub use error::{CacheError, Result};
pub use memory::InMemoryCache;
pub use read_through::ReadThrough;
pub use redis_cache::RedisCache;
