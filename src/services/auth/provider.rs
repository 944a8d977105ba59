//! End-to-end authorization decision for one call.
use tracing::instrument;

use crate::services::auth::error::AuthError;
use crate::services::auth::identity::Identity;
use crate::services::auth::registry::{EndpointDescriptor, EndpointRegistry, EndpointRule};
use crate::services::auth::roles::has_any_role;
use crate::services::auth::verifier::TokenVerifier;
use crate::services::cache::CacheClient;

/// Successful outcome of [`AuthProvider::authorize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    /// Endpoint is not registered: proceed without an identity.
    Unprotected,
    /// Token verified and roles satisfied.
    Authenticated(Identity),
}

impl AuthOutcome {
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            AuthOutcome::Unprotected => None,
            AuthOutcome::Authenticated(identity) => Some(identity),
        }
    }

    pub fn into_identity(self) -> Option<Identity> {
        match self {
            AuthOutcome::Unprotected => None,
            AuthOutcome::Authenticated(identity) => Some(identity),
        }
    }
}

/// Registry + verifier + role check.
///
/// Transport adapters call [`Self::is_secure_endpoint`] before extracting a
/// bearer token, then [`Self::authorize`] with the bare token.
pub struct AuthProvider<C: CacheClient> {
    registry: EndpointRegistry,
    verifier: TokenVerifier<C>,
}

impl<C: CacheClient> std::fmt::Debug for AuthProvider<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthProvider")
            .field("secure_endpoints", &self.registry.len())
            .field("verifier", &self.verifier)
            .finish()
    }
}

impl<C: CacheClient> AuthProvider<C> {
    pub fn new(verifier: TokenVerifier<C>) -> Self {
        Self::with_registry(EndpointRegistry::new(), verifier)
    }

    pub fn with_registry(registry: EndpointRegistry, verifier: TokenVerifier<C>) -> Self {
        Self { registry, verifier }
    }

    pub fn registry(&self) -> &EndpointRegistry {
        &self.registry
    }

    pub fn verifier(&self) -> &TokenVerifier<C> {
        &self.verifier
    }

    pub fn add_secure_endpoint<I, S>(&self, endpoint: &EndpointDescriptor, roles: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.registry.register(endpoint, roles);
    }

    pub fn register_endpoints(&self, rules: impl IntoIterator<Item = EndpointRule>) {
        self.registry.register_rules(rules);
    }

    pub fn is_secure_endpoint(&self, endpoint: &EndpointDescriptor) -> bool {
        self.registry.is_protected(endpoint)
    }

    /// Decide whether the bearer of `token` may call `endpoint`.
    ///
    /// # Errors
    ///
    /// - verification failures keep their kind (`InvalidToken`,
    ///   `UnexpectedSigningMethod`, `ValidationFailed`, `KeyUnavailable`)
    /// - `AccessDenied` when the verified identity holds none of the required roles
    #[instrument(skip_all, fields(endpoint = %endpoint))]
    pub async fn authorize(
        &self,
        endpoint: &EndpointDescriptor,
        token: &str,
    ) -> Result<AuthOutcome, AuthError> {
        let Some(required) = self.registry.lookup(endpoint) else {
            tracing::debug!("endpoint not protected");
            return Ok(AuthOutcome::Unprotected);
        };

        let identity = self.verifier.verify(token).await.map_err(|err| {
            tracing::warn!(error = %err, "failed to verify token");
            err
        })?;

        if !has_any_role(&required, &identity.roles) {
            tracing::warn!(
                user_id = %identity.user_id,
                username = %identity.username,
                user_roles = ?identity.roles,
                needed_roles = ?required,
                "user doesn't have needed roles"
            );
            return Err(AuthError::AccessDenied {
                identity: Box::new(identity),
                required,
            });
        }

        tracing::debug!(user_id = %identity.user_id, "authorization succeeded");
        Ok(AuthOutcome::Authenticated(identity))
    }
}
