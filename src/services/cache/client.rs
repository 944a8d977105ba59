//! Cache client interface used by the signing-key cache.
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Cache-layer errors (transport/command/serialization).
///
/// Note:
/// - Kept independent from `AuthError` so callers decide how to fail
///   (the key-set cache fails closed on reads and follows its write policy on writes).
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    #[error("cache connection error: {0}")]
    BackendConnection(String),
    #[error("cache command error: {0}")]
    BackendCommand(String),
    #[error("cache value error: {0}")]
    InvalidValue(String),
}

/// A minimal shared-store interface.
///
/// Small and string-based: the key-set cache stores exactly one serialized
/// blob under a fixed key, so `GET`, `SET EX` and `DEL` cover it.
///
/// Implementations must be cheap to clone (typically `Arc<...>` inside).
/// Expiry is owned by the backend: an expired entry reads as `None`.
#[async_trait]
pub trait CacheClient: Clone + Send + Sync + 'static {
    // Returns the cache backend name (for logging).
    fn backend_name(&self) -> &'static str;

    // Get UTF-8 string value. `None` when absent or expired.
    async fn get_string(&self, key: &str) -> CacheResult<Option<String>>;

    // Set (overwrite) a value with TTL.
    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()>;

    // Delete a key. Returns number of deleted keys.
    async fn del(&self, key: &str) -> CacheResult<u64>;
}
