/// Factory: build `AuthProvider` from application `Config`.
use std::sync::Arc;

use crate::config::KeycloakConfig;
use crate::services::auth::jwks::{HttpKeySource, KeySetCache, KeySourceError};
use crate::services::auth::provider::AuthProvider;
use crate::services::auth::verifier::TokenVerifier;
use crate::services::cache::CacheClient;

pub fn build_auth_provider<C: CacheClient>(
    config: &KeycloakConfig,
    store: C,
) -> Result<Arc<AuthProvider<C>>, KeySourceError> {
    let source = HttpKeySource::new(config.public_jwk_uri.clone(), config.fetch_timeout)?;

    let keys = KeySetCache::new(store, Arc::new(source))
        .with_ttl(config.refresh_jwk_timeout)
        .with_timeout(config.fetch_timeout)
        .with_write_policy(config.cache_write_policy);

    let verifier = TokenVerifier::new(Arc::new(keys), config.client_id.clone())
        .with_leeway(config.token_leeway_seconds);

    let provider = AuthProvider::new(verifier);
    provider.register_endpoints(config.secure_endpoints.iter().cloned());

    Ok(Arc::new(provider))
}
