//! Claim extraction from a verified Keycloak access-token payload.
//!
//! Client roles live under `resource_access.<client-id>.roles`, where the key
//! is the client id itself. Decoding is done in two passes: the payload is
//! first read with `resource_access` as a generic map, then only the entry
//! whose key equals the configured client id is decoded into [`ClientAccess`].
use std::collections::HashMap;

use serde::Deserialize;
use serde_json::{Map, Value};
use uuid::{Uuid, Variant, Version};

use crate::services::auth::error::InvalidTokenReason;
use crate::services::auth::identity::Identity;

/// Profile claims plus the still-undecoded `resource_access` section.
#[derive(Debug, Deserialize)]
struct ProfileClaims {
    #[serde(default)]
    sub: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    preferred_username: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    family_name: Option<String>,
    #[serde(default)]
    resource_access: Option<HashMap<String, Value>>,
}

/// Per-client section of `resource_access`.
#[derive(Debug, Default, Deserialize)]
pub struct ClientAccess {
    #[serde(default)]
    pub roles: Option<Vec<String>>,
}

/// Build an [`Identity`] from a verified payload.
///
/// Fails with an invalid-token reason when:
/// - `sub` is missing or empty
/// - `sub` is not a hyphenated UUID v4
/// - any known claim has an unexpected JSON type
///
/// A missing client section yields an identity without roles.
pub fn extract_identity(
    payload: Map<String, Value>,
    client_id: &str,
) -> Result<Identity, InvalidTokenReason> {
    let claims: ProfileClaims = serde_json::from_value(Value::Object(payload)).map_err(|e| {
        tracing::debug!(error = %e, "token payload does not match expected claim types");
        InvalidTokenReason::MalformedClaims
    })?;

    let sub = claims
        .sub
        .filter(|s| !s.is_empty())
        .ok_or(InvalidTokenReason::MissingClaim("sub"))?;
    let user_id = parse_subject(&sub)?;

    let roles = client_roles(claims.resource_access, client_id)?;

    Ok(Identity {
        roles,
        user_id,
        email: claims.email.unwrap_or_default(),
        username: claims.preferred_username.unwrap_or_default(),
        name: claims.name.unwrap_or_default(),
        family_name: claims.family_name.unwrap_or_default(),
    })
}

fn client_roles(
    resource_access: Option<HashMap<String, Value>>,
    client_id: &str,
) -> Result<Vec<String>, InvalidTokenReason> {
    let Some(section) = resource_access.and_then(|mut m| m.remove(client_id)) else {
        return Ok(Vec::new());
    };

    let access: ClientAccess = serde_json::from_value(section).map_err(|e| {
        tracing::debug!(client_id, error = %e, "client roles section is malformed");
        InvalidTokenReason::MalformedClaims
    })?;

    Ok(access.roles.unwrap_or_default())
}

/// Accept only the canonical hyphenated UUID v4 form (RFC 4122 variant).
pub fn parse_subject(sub: &str) -> Result<Uuid, InvalidTokenReason> {
    // Uuid::try_parse also accepts simple, braced and urn forms; 36 chars is the hyphenated one.
    if sub.len() != 36 {
        return Err(InvalidTokenReason::InvalidSubject);
    }
    let id = Uuid::try_parse(sub).map_err(|_| InvalidTokenReason::InvalidSubject)?;
    if id.get_version() != Some(Version::Random) || id.get_variant() != Variant::RFC4122 {
        return Err(InvalidTokenReason::InvalidSubject);
    }
    Ok(id)
}
