//! Signing-key acquisition: remote JWKS source plus the shared-store cache in front of it.
pub mod cache;
pub mod source;

pub use cache::{
    CacheWritePolicy, DEFAULT_OPERATION_TIMEOUT, DEFAULT_REFRESH_TTL, JWK_SET_CACHE_KEY,
    KeySetCache, deserialize_key_set, serialize_key_set,
};
pub use source::{HttpKeySource, KeySource, KeySourceError};
