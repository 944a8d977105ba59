//! Runtime choice between the shared Valkey store and the process-local map.
use async_trait::async_trait;
use std::time::Duration;

use super::client::{CacheClient, CacheResult};
use super::memory::InMemoryCache;
use super::valkey::ValkeyClient;

/// Store selected at startup (`REDIS_URL` set or not).
#[derive(Debug, Clone)]
pub enum CacheBackend {
    Valkey(ValkeyClient),
    Memory(InMemoryCache),
}

impl CacheBackend {
    /// Connect to Valkey when a URL is given, otherwise fall back to memory.
    pub async fn connect(redis_url: Option<&str>) -> CacheResult<Self> {
        match redis_url {
            Some(url) => Ok(Self::Valkey(ValkeyClient::new(url).await?)),
            None => Ok(Self::Memory(InMemoryCache::new())),
        }
    }
}

#[async_trait]
impl CacheClient for CacheBackend {
    fn backend_name(&self) -> &'static str {
        match self {
            Self::Valkey(client) => client.backend_name(),
            Self::Memory(client) => client.backend_name(),
        }
    }

    async fn get_string(&self, key: &str) -> CacheResult<Option<String>> {
        match self {
            Self::Valkey(client) => client.get_string(key).await,
            Self::Memory(client) => client.get_string(key).await,
        }
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        match self {
            Self::Valkey(client) => client.set_with_ttl(key, value, ttl).await,
            Self::Memory(client) => client.set_with_ttl(key, value, ttl).await,
        }
    }

    async fn del(&self, key: &str) -> CacheResult<u64> {
        match self {
            Self::Valkey(client) => client.del(key).await,
            Self::Memory(client) => client.del(key).await,
        }
    }
}
