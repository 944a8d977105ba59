//! Signing-key cache backed by a shared store.
//!
//! The whole key set is stored as one JSON blob under [`JWK_SET_CACHE_KEY`]
//! with the configured TTL. Freshness is owned by the store: an expired entry
//! reads as absent and triggers a fetch from the [`KeySource`].
//!
//! Concurrent misses share one in-flight fetch. The warm path (store hit)
//! never touches the in-flight slot.
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures::FutureExt;
use futures::future::{BoxFuture, Shared, WeakShared};
use jsonwebtoken::jwk::{Jwk, JwkSet};
use tokio::time::timeout;
use tracing::instrument;

use crate::services::auth::error::{AuthError, InvalidTokenReason, KeyUnavailableReason};
use crate::services::auth::jwks::source::KeySource;
use crate::services::cache::{CacheClient, CacheError};

/// Shared-store key holding the serialized key set.
pub const JWK_SET_CACHE_KEY: &str = "jwk-set";

/// Default key-set lifetime in the shared store (3 hours).
pub const DEFAULT_REFRESH_TTL: Duration = Duration::from_secs(3 * 60 * 60);

/// Default bound for a single store operation or remote fetch.
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(10);

/// What to do when a freshly fetched key set cannot be written to the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CacheWritePolicy {
    /// Fail the current call with `KeyUnavailable`.
    #[default]
    FailClosed,
    /// Log the write failure and serve the fetched keys.
    FailOpen,
}

type RefreshResult = Result<Arc<JwkSet>, KeyUnavailableReason>;
type RefreshFuture = BoxFuture<'static, RefreshResult>;

pub fn serialize_key_set(set: &JwkSet) -> Result<String, CacheError> {
    serde_json::to_string(set).map_err(|e| CacheError::InvalidValue(e.to_string()))
}

pub fn deserialize_key_set(blob: &str) -> Result<JwkSet, CacheError> {
    serde_json::from_str(blob).map_err(|e| CacheError::InvalidValue(e.to_string()))
}

pub struct KeySetCache<C: CacheClient> {
    store: C,
    source: Arc<dyn KeySource>,
    ttl: Duration,
    op_timeout: Duration,
    write_policy: CacheWritePolicy,
    in_flight: Mutex<Option<WeakShared<RefreshFuture>>>,
}

impl<C: CacheClient> std::fmt::Debug for KeySetCache<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeySetCache")
            .field("store", &self.store.backend_name())
            .field("source", &self.source.describe())
            .field("ttl", &self.ttl)
            .field("op_timeout", &self.op_timeout)
            .field("write_policy", &self.write_policy)
            .finish()
    }
}

impl<C: CacheClient> KeySetCache<C> {
    pub fn new(store: C, source: Arc<dyn KeySource>) -> Self {
        Self {
            store,
            source,
            ttl: DEFAULT_REFRESH_TTL,
            op_timeout: DEFAULT_OPERATION_TIMEOUT,
            write_policy: CacheWritePolicy::default(),
            in_flight: Mutex::new(None),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_timeout(mut self, op_timeout: Duration) -> Self {
        self.op_timeout = op_timeout;
        self
    }

    pub fn with_write_policy(mut self, write_policy: CacheWritePolicy) -> Self {
        self.write_policy = write_policy;
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Resolve the verification key named `kid`.
    ///
    /// # Errors
    ///
    /// - `InvalidToken(KeyNotFound)` when the current key set has no such key
    /// - `KeyUnavailable` when the store or the key source fails or times out
    #[instrument(skip(self), fields(store = self.store.backend_name()))]
    pub async fn resolve(&self, kid: &str) -> Result<Jwk, AuthError> {
        let set = match self.read_cached().await? {
            Some(set) => {
                tracing::debug!("JWKS cache hit");
                set
            }
            None => {
                tracing::debug!("JWKS cache miss");
                self.refresh().await?
            }
        };

        match set.find(kid) {
            Some(jwk) => Ok(jwk.clone()),
            None => {
                tracing::warn!(kid, "signing key not found in JWKS");
                Err(InvalidTokenReason::KeyNotFound {
                    kid: kid.to_string(),
                }
                .into())
            }
        }
    }

    /// Drop the stored key set so the next resolution fetches a fresh one.
    pub async fn invalidate(&self) -> Result<(), AuthError> {
        match timeout(self.op_timeout, self.store.del(JWK_SET_CACHE_KEY)).await {
            Err(_) => Err(KeyUnavailableReason::Timeout {
                operation: "key cache delete",
            }
            .into()),
            Ok(Err(e)) => Err(KeyUnavailableReason::Store(e).into()),
            Ok(Ok(_)) => Ok(()),
        }
    }

    async fn read_cached(&self) -> Result<Option<Arc<JwkSet>>, KeyUnavailableReason> {
        let blob = match timeout(self.op_timeout, self.store.get_string(JWK_SET_CACHE_KEY)).await {
            Err(_) => {
                tracing::error!("JWKS cache read timed out");
                return Err(KeyUnavailableReason::Timeout {
                    operation: "key cache read",
                });
            }
            Ok(Err(e)) => {
                tracing::error!(error = %e, "JWKS cache read failed");
                return Err(KeyUnavailableReason::Store(e));
            }
            Ok(Ok(blob)) => blob,
        };

        let Some(blob) = blob else {
            return Ok(None);
        };

        match deserialize_key_set(&blob) {
            Ok(set) => Ok(Some(Arc::new(set))),
            Err(e) => {
                // Unreadable entry: refetch and overwrite it.
                tracing::warn!(error = %e, "cached JWKS is unreadable, treating as miss");
                Ok(None)
            }
        }
    }

    /// Join the in-flight fetch if there is one, otherwise start it.
    async fn refresh(&self) -> RefreshResult {
        let fetch = {
            let mut slot = self
                .in_flight
                .lock()
                .unwrap_or_else(PoisonError::into_inner);

            match slot.as_ref().and_then(|weak| weak.upgrade()) {
                Some(fetch) => {
                    tracing::debug!("joining in-flight JWKS refresh");
                    fetch
                }
                None => {
                    let fetch: Shared<RefreshFuture> = fetch_and_store(
                        self.store.clone(),
                        Arc::clone(&self.source),
                        self.ttl,
                        self.op_timeout,
                        self.write_policy,
                    )
                    .boxed()
                    .shared();
                    *slot = fetch.downgrade();
                    fetch
                }
            }
        };

        // Dropping every waiter drops the fetch too (only a weak handle is kept).
        fetch.await
    }
}

async fn fetch_and_store<C: CacheClient>(
    store: C,
    source: Arc<dyn KeySource>,
    ttl: Duration,
    op_timeout: Duration,
    write_policy: CacheWritePolicy,
) -> RefreshResult {
    let set = match timeout(op_timeout, source.fetch()).await {
        Err(_) => {
            tracing::error!(source = %source.describe(), "JWKS fetch timed out");
            return Err(KeyUnavailableReason::Timeout {
                operation: "key set fetch",
            });
        }
        Ok(result) => result?,
    };
    tracing::info!(
        source = %source.describe(),
        key_count = set.keys.len(),
        "fetched JWKS from remote"
    );

    let set = Arc::new(set);
    let write = match serialize_key_set(&set) {
        Ok(blob) => match timeout(op_timeout, store.set_with_ttl(JWK_SET_CACHE_KEY, &blob, ttl)).await
        {
            Err(_) => Err(KeyUnavailableReason::Timeout {
                operation: "key cache write",
            }),
            Ok(result) => result.map_err(KeyUnavailableReason::Store),
        },
        Err(e) => Err(KeyUnavailableReason::Store(e)),
    };

    if let Err(e) = write {
        match write_policy {
            CacheWritePolicy::FailClosed => {
                tracing::error!(error = %e, "failed to store JWKS in cache");
                return Err(e);
            }
            CacheWritePolicy::FailOpen => {
                tracing::warn!(error = %e, "failed to store JWKS in cache, serving fetched keys");
            }
        }
    }

    Ok(set)
}
