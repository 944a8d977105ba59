//! Error kinds produced by the authorization pipeline.
//!
//! Every variant is terminal for the current call. Messages name the failed
//! check and, where useful, the offending field; they never include the raw
//! token or any key material.
use thiserror::Error;

use crate::services::auth::identity::Identity;
use crate::services::auth::jwks::KeySourceError;
use crate::services::cache::CacheError;

/// Why a token was rejected as invalid.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidTokenReason {
    #[error("token is empty")]
    Empty,
    #[error("token exceeds {max} bytes")]
    Oversized { max: usize },
    #[error("malformed token structure")]
    Malformed,
    #[error("no signing key with kid '{kid}' in the current key set")]
    KeyNotFound { kid: String },
    #[error("signing key '{kid}' is not a usable RSA verification key")]
    UnusableKey { kid: String },
    #[error("signature verification failed")]
    BadSignature,
    #[error("token has expired")]
    Expired,
    #[error("token is not valid yet")]
    NotYetValid,
    #[error("malformed claims payload")]
    MalformedClaims,
    #[error("missing '{0}' claim")]
    MissingClaim(&'static str),
    #[error("'sub' claim is not a UUID v4")]
    InvalidSubject,
}

/// Why signing keys could not be obtained.
#[derive(Debug, Clone, Error)]
pub enum KeyUnavailableReason {
    #[error("key source: {0}")]
    Source(#[from] KeySourceError),
    #[error("key cache: {0}")]
    Store(#[from] CacheError),
    #[error("{operation} timed out")]
    Timeout { operation: &'static str },
}

/// Closed set of authorization failures.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid token: {0}")]
    InvalidToken(InvalidTokenReason),

    /// The identity is known but lacks every required role. The identity is
    /// kept for audit logging.
    #[error("access denied: none of the required roles {required:?} granted")]
    AccessDenied {
        identity: Box<Identity>,
        required: Vec<String>,
    },

    /// `alg` header outside the RSA family (RS256/RS384/RS512).
    #[error("unexpected signing method: {0}")]
    UnexpectedSigningMethod(String),

    #[error("token validation failed: missing '{0}' header")]
    ValidationFailed(&'static str),

    #[error("signing keys unavailable: {0}")]
    KeyUnavailable(#[source] KeyUnavailableReason),
}

/// Fieldless view of [`AuthError`] for exhaustive mapping in adapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorKind {
    InvalidToken,
    AccessDenied,
    UnexpectedSigningMethod,
    ValidationFailed,
    KeyUnavailable,
}

impl AuthError {
    pub fn kind(&self) -> AuthErrorKind {
        match self {
            AuthError::InvalidToken(_) => AuthErrorKind::InvalidToken,
            AuthError::AccessDenied { .. } => AuthErrorKind::AccessDenied,
            AuthError::UnexpectedSigningMethod(_) => AuthErrorKind::UnexpectedSigningMethod,
            AuthError::ValidationFailed(_) => AuthErrorKind::ValidationFailed,
            AuthError::KeyUnavailable(_) => AuthErrorKind::KeyUnavailable,
        }
    }

    /// The denied identity, when the failure happened after verification.
    pub fn identity(&self) -> Option<&Identity> {
        match self {
            AuthError::AccessDenied { identity, .. } => Some(identity.as_ref()),
            _ => None,
        }
    }

    /// `true` for failures an adapter reports as "unauthenticated"
    /// (as opposed to "forbidden").
    pub fn is_unauthenticated(&self) -> bool {
        !matches!(self.kind(), AuthErrorKind::AccessDenied)
    }
}

impl From<InvalidTokenReason> for AuthError {
    fn from(reason: InvalidTokenReason) -> Self {
        AuthError::InvalidToken(reason)
    }
}

impl From<KeyUnavailableReason> for AuthError {
    fn from(reason: KeyUnavailableReason) -> Self {
        AuthError::KeyUnavailable(reason)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_kind_is_exhaustive_over_variants() {
        assert_eq!(
            AuthError::from(InvalidTokenReason::Malformed).kind(),
            AuthErrorKind::InvalidToken
        );
        assert_eq!(
            AuthError::UnexpectedSigningMethod("HS256".to_string()).kind(),
            AuthErrorKind::UnexpectedSigningMethod
        );
        assert_eq!(
            AuthError::ValidationFailed("kid").kind(),
            AuthErrorKind::ValidationFailed
        );
        assert_eq!(
            AuthError::from(KeyUnavailableReason::Timeout {
                operation: "key set fetch"
            })
            .kind(),
            AuthErrorKind::KeyUnavailable
        );
    }

    #[test]
    fn test_access_denied_keeps_identity() {
        let identity = Identity {
            roles: vec!["viewer".to_string()],
            user_id: Uuid::new_v4(),
            email: String::new(),
            username: "alice".to_string(),
            name: String::new(),
            family_name: String::new(),
        };
        let err = AuthError::AccessDenied {
            identity: Box::new(identity.clone()),
            required: vec!["admin".to_string()],
        };

        assert_eq!(err.identity(), Some(&identity));
        assert!(!err.is_unauthenticated());
    }

    #[test]
    fn test_key_not_found_is_distinct_from_unavailable() {
        let not_found = AuthError::from(InvalidTokenReason::KeyNotFound {
            kid: "k1".to_string(),
        });
        let unavailable = AuthError::from(KeyUnavailableReason::Store(
            CacheError::BackendConnection("refused".to_string()),
        ));

        assert_ne!(not_found.kind(), unavailable.kind());
        assert!(not_found.is_unauthenticated());
        assert!(unavailable.is_unauthenticated());
    }

    #[test]
    fn test_display_does_not_leak_token() {
        let err = AuthError::from(InvalidTokenReason::BadSignature);
        assert_eq!(err.to_string(), "invalid token: signature verification failed");
    }
}
