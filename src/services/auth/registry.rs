//! Registry of protected endpoints and the roles they require.
//!
//! An endpoint is either registered (protected) or not (open). An empty role
//! list still means "protected": any verified identity is accepted.
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// Identity of a callable endpoint.
///
/// - HTTP routes: `method` + `path` (e.g. `GET` + `/api/users`).
/// - RPC methods: full method name in `path` (e.g. `/pkg.Service/Method`), no method.
///
/// Fields are private so every descriptor goes through a constructor and
/// equality always agrees with [`Self::key`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EndpointDescriptor {
    path: String,
    method: Option<String>,
}

impl EndpointDescriptor {
    pub fn http(method: impl AsRef<str>, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method: Some(method.as_ref().to_ascii_uppercase()),
        }
    }

    /// Descriptor for an RPC method, keyed by its full name.
    ///
    /// An RPC adapter reads the `authorization` metadata entry and follows the
    /// same steps as the HTTP middleware:
    ///
    /// ```no_run
    /// use keycloak_authz::middleware::bearer_auth::extract_bearer;
    /// use keycloak_authz::services::auth::{AuthProvider, EndpointDescriptor, Identity};
    /// use keycloak_authz::services::cache::CacheClient;
    ///
    /// enum RpcStatus {
    ///     Unauthenticated,
    ///     PermissionDenied,
    /// }
    ///
    /// async fn authorize_call<C: CacheClient>(
    ///     provider: &AuthProvider<C>,
    ///     full_method: &str,
    ///     authorization: Option<&str>,
    /// ) -> Result<Option<Identity>, RpcStatus> {
    ///     let endpoint = EndpointDescriptor::rpc(full_method);
    ///     if !provider.is_secure_endpoint(&endpoint) {
    ///         return Ok(None);
    ///     }
    ///
    ///     let token = extract_bearer(authorization).map_err(|_| RpcStatus::Unauthenticated)?;
    ///     match provider.authorize(&endpoint, token).await {
    ///         Ok(outcome) => Ok(outcome.into_identity()),
    ///         Err(err) if err.is_unauthenticated() => Err(RpcStatus::Unauthenticated),
    ///         Err(_) => Err(RpcStatus::PermissionDenied),
    ///     }
    /// }
    /// ```
    pub fn rpc(full_method: impl Into<String>) -> Self {
        Self {
            path: full_method.into(),
            method: None,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Upper-cased HTTP method; `None` for RPC descriptors.
    pub fn method(&self) -> Option<&str> {
        self.method.as_deref()
    }

    /// Registry key: `METHOD:path` when a method is present, otherwise `path`.
    pub fn key(&self) -> String {
        match self.method.as_deref() {
            Some(method) => format!("{}:{}", method, self.path),
            None => self.path.clone(),
        }
    }
}

impl std::fmt::Display for EndpointDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.key())
    }
}

/// One registration: an endpoint and the roles that may call it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointRule {
    pub endpoint: EndpointDescriptor,
    pub roles: Vec<String>,
}

impl EndpointRule {
    pub fn new<I, S>(endpoint: EndpointDescriptor, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            endpoint,
            roles: roles.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RuleParseError {
    #[error("endpoint rule '{0}' has an empty path")]
    EmptyPath(String),
}

/// Parse `;`-separated rules of the form `[METHOD:]path[=role1,role2]`.
///
/// - `GET:/api/users=admin,ops` → HTTP rule with two roles
/// - `/pkg.Service/Method` → RPC rule, identity required, no specific role
pub fn parse_rules(raw: &str) -> Result<Vec<EndpointRule>, RuleParseError> {
    raw.split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|entry| {
            let (target, roles) = match entry.split_once('=') {
                Some((target, roles)) => (target.trim(), roles),
                None => (entry, ""),
            };
            let roles = roles
                .split(',')
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .map(str::to_string)
                .collect::<Vec<_>>();

            // A method prefix never starts with '/', an RPC/HTTP path always does.
            let endpoint = match target.split_once(':') {
                Some((method, path)) if !method.starts_with('/') => {
                    EndpointDescriptor::http(method.trim(), path.trim())
                }
                _ => EndpointDescriptor::rpc(target),
            };
            if endpoint.path.is_empty() {
                return Err(RuleParseError::EmptyPath(entry.to_string()));
            }

            Ok(EndpointRule { endpoint, roles })
        })
        .collect()
}

/// Table of protected endpoints.
///
/// Populated at startup and read on every call. Writes after startup are
/// allowed and serialized behind the write lock.
#[derive(Debug, Default)]
pub struct EndpointRegistry {
    endpoints: RwLock<HashMap<String, Vec<String>>>,
}

impl EndpointRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Protect `endpoint`, replacing any roles registered before.
    pub fn register<I, S>(&self, endpoint: &EndpointDescriptor, roles: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let roles: Vec<String> = roles.into_iter().map(Into::into).collect();
        let key = endpoint.key();
        tracing::debug!(endpoint = %key, roles = ?roles, "registering secure endpoint");

        self.endpoints
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, roles);
    }

    pub fn register_rules(&self, rules: impl IntoIterator<Item = EndpointRule>) {
        let mut endpoints = self
            .endpoints
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        for rule in rules {
            tracing::debug!(endpoint = %rule.endpoint, roles = ?rule.roles, "registering secure endpoint");
            endpoints.insert(rule.endpoint.key(), rule.roles);
        }
    }

    /// Make `endpoint` open again. Returns `true` if it was protected.
    pub fn unregister(&self, endpoint: &EndpointDescriptor) -> bool {
        self.endpoints
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&endpoint.key())
            .is_some()
    }

    pub fn is_protected(&self, endpoint: &EndpointDescriptor) -> bool {
        self.endpoints
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&endpoint.key())
    }

    /// Roles required by `endpoint`. Empty both for "protected, any role" and
    /// for unregistered endpoints; check [`Self::is_protected`] first.
    pub fn required_roles(&self, endpoint: &EndpointDescriptor) -> Vec<String> {
        self.endpoints
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&endpoint.key())
            .cloned()
            .unwrap_or_default()
    }

    /// Single-lock lookup used on the request path: `None` when open.
    pub fn lookup(&self, endpoint: &EndpointDescriptor) -> Option<Vec<String>> {
        self.endpoints
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&endpoint.key())
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.endpoints
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
