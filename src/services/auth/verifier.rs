//! Access-token verification against the provider's published RSA keys.
//!
//! Checks run in a fixed order and stop at the first failure:
//! 1. size and framing (`header.payload.signature`)
//! 2. `alg` is RS256/RS384/RS512 (rejects algorithm confusion)
//! 3. `kid` header is present
//! 4. key resolution through the key-set cache
//! 5. signature
//! 6. `exp` / `nbf` when present
//! 7. claim extraction
use std::sync::Arc;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::jwk::{AlgorithmParameters, Jwk, PublicKeyUse};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, errors::ErrorKind};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::instrument;

use crate::services::auth::claims::extract_identity;
use crate::services::auth::error::{AuthError, InvalidTokenReason};
use crate::services::auth::identity::Identity;
use crate::services::auth::jwks::KeySetCache;
use crate::services::cache::CacheClient;

/// Tokens above this size are rejected before any decoding.
///
/// Keycloak tokens grow with the number of roles and groups; 16 KiB leaves
/// headroom while bounding base64/JSON work per request.
pub const MAX_TOKEN_SIZE_BYTES: usize = 16 * 1024;

/// JOSE header fields needed before a key can be chosen.
#[derive(Debug, Deserialize)]
struct RawHeader {
    #[serde(default)]
    alg: Option<String>,
    #[serde(default)]
    kid: Option<Value>,
}

/// Header checked for framing, algorithm family and key id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckedHeader {
    pub alg: Algorithm,
    pub kid: String,
}

/// Parse and check the JOSE header without touching keys.
pub fn check_header(token: &str) -> Result<CheckedHeader, AuthError> {
    if token.is_empty() {
        return Err(InvalidTokenReason::Empty.into());
    }
    if token.len() > MAX_TOKEN_SIZE_BYTES {
        tracing::debug!(
            token_size = token.len(),
            max_size = MAX_TOKEN_SIZE_BYTES,
            "token rejected: size exceeds maximum allowed"
        );
        return Err(InvalidTokenReason::Oversized {
            max: MAX_TOKEN_SIZE_BYTES,
        }
        .into());
    }

    let mut parts = token.split('.');
    let (Some(header_b64), Some(_), Some(_), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        tracing::debug!("token rejected: not a three-part JWS");
        return Err(InvalidTokenReason::Malformed.into());
    };

    let header_bytes = URL_SAFE_NO_PAD.decode(header_b64).map_err(|e| {
        tracing::debug!(error = %e, "failed to decode token header base64");
        InvalidTokenReason::Malformed
    })?;
    let header: RawHeader = serde_json::from_slice(&header_bytes).map_err(|e| {
        tracing::debug!(error = %e, "failed to parse token header JSON");
        InvalidTokenReason::Malformed
    })?;

    let alg = header.alg.ok_or(InvalidTokenReason::Malformed)?;
    let alg = match alg.as_str() {
        "RS256" => Algorithm::RS256,
        "RS384" => Algorithm::RS384,
        "RS512" => Algorithm::RS512,
        _ => {
            tracing::warn!(alg = %alg, "token rejected: unexpected signing method");
            return Err(AuthError::UnexpectedSigningMethod(alg));
        }
    };

    let kid = header
        .kid
        .as_ref()
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .ok_or(AuthError::ValidationFailed("kid"))?;

    Ok(CheckedHeader { alg, kid })
}

/// Turn a JWK into an RSA verification key.
fn rsa_decoding_key(jwk: &Jwk, kid: &str) -> Result<DecodingKey, InvalidTokenReason> {
    let unusable = || InvalidTokenReason::UnusableKey {
        kid: kid.to_string(),
    };

    if !matches!(jwk.algorithm, AlgorithmParameters::RSA(_)) {
        tracing::warn!(kid, "JWK is not an RSA key");
        return Err(unusable());
    }
    if matches!(jwk.common.public_key_use, Some(PublicKeyUse::Encryption)) {
        tracing::warn!(kid, "JWK is an encryption key");
        return Err(unusable());
    }

    DecodingKey::from_jwk(jwk).map_err(|e| {
        tracing::warn!(kid, error = %e, "JWK cannot be used for verification");
        unusable()
    })
}

fn map_decode_error(e: jsonwebtoken::errors::Error, kid: &str) -> InvalidTokenReason {
    tracing::debug!(kid, error = %e, "token verification failed");
    match e.kind() {
        ErrorKind::InvalidSignature => InvalidTokenReason::BadSignature,
        ErrorKind::ExpiredSignature => InvalidTokenReason::Expired,
        ErrorKind::ImmatureSignature => InvalidTokenReason::NotYetValid,
        ErrorKind::InvalidAlgorithm | ErrorKind::InvalidKeyFormat => InvalidTokenReason::UnusableKey {
            kid: kid.to_string(),
        },
        _ => InvalidTokenReason::Malformed,
    }
}

/// Verifies RSA-signed access tokens and extracts the caller identity.
pub struct TokenVerifier<C: CacheClient> {
    keys: Arc<KeySetCache<C>>,
    client_id: String,
    leeway_seconds: u64,
}

impl<C: CacheClient> std::fmt::Debug for TokenVerifier<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenVerifier")
            .field("keys", &self.keys)
            .field("client_id", &self.client_id)
            .field("leeway_seconds", &self.leeway_seconds)
            .finish()
    }
}

impl<C: CacheClient> TokenVerifier<C> {
    pub fn new(keys: Arc<KeySetCache<C>>, client_id: impl Into<String>) -> Self {
        Self {
            keys,
            client_id: client_id.into(),
            leeway_seconds: 0,
        }
    }

    /// Clock skew tolerated on `exp` / `nbf`.
    pub fn with_leeway(mut self, leeway_seconds: u64) -> Self {
        self.leeway_seconds = leeway_seconds;
        self
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn keys(&self) -> &KeySetCache<C> {
        &self.keys
    }

    /// Verify `token` and build the caller identity.
    #[instrument(skip_all)]
    pub async fn verify(&self, token: &str) -> Result<Identity, AuthError> {
        let payload = self.verify_payload(token).await?;

        let identity = extract_identity(payload, &self.client_id).map_err(|reason| {
            tracing::debug!(reason = %reason, "token claims rejected");
            AuthError::InvalidToken(reason)
        })?;

        tracing::debug!(user_id = %identity.user_id, "token verified");
        Ok(identity)
    }

    /// Steps 1–6: returns the signature-checked payload.
    pub async fn verify_payload(&self, token: &str) -> Result<Map<String, Value>, AuthError> {
        let header = check_header(token)?;

        let jwk = self.keys.resolve(&header.kid).await?;
        let key = rsa_decoding_key(&jwk, &header.kid)?;

        let data = decode::<Map<String, Value>>(token, &key, &self.validation(header.alg))
            .map_err(|e| map_decode_error(e, &header.kid))?;

        Ok(data.claims)
    }

    fn validation(&self, alg: Algorithm) -> Validation {
        let mut validation = Validation::new(alg);
        // Keycloak sets `aud` to other clients ("account"); roles are checked instead.
        validation.validate_aud = false;
        validation.validate_exp = true;
        validation.validate_nbf = true;
        // exp/nbf are checked only when present.
        validation.required_spec_claims.clear();
        validation.leeway = self.leeway_seconds;
        validation
    }
}
