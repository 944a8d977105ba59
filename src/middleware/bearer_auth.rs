/*
 * Responsibility
 * - Pull the bare token out of an `authorization: Bearer <token>` value
 * - Shared by every transport adapter (HTTP header, RPC metadata entry)
 */
use axum::http::{HeaderMap, header};
use thiserror::Error;

const SCHEME: &str = "bearer";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BearerError {
    #[error("authorization header is missing")]
    Missing,
    #[error("authorization header is not a bearer credential")]
    NotBearer,
    #[error("bearer token is empty")]
    EmptyToken,
}

/// Parse one `authorization` value. The scheme is matched case-insensitively.
pub fn extract_bearer(value: Option<&str>) -> Result<&str, BearerError> {
    let value = value.ok_or(BearerError::Missing)?;

    let (scheme, token) = value.split_once(' ').ok_or(BearerError::NotBearer)?;
    if !scheme.eq_ignore_ascii_case(SCHEME) {
        return Err(BearerError::NotBearer);
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(BearerError::EmptyToken);
    }
    Ok(token)
}

/// First `authorization` header of an HTTP request. Non-ASCII values count as malformed.
pub fn bearer_from_headers(headers: &HeaderMap) -> Result<&str, BearerError> {
    match headers.get(header::AUTHORIZATION) {
        None => Err(BearerError::Missing),
        Some(value) => extract_bearer(Some(value.to_str().map_err(|_| BearerError::NotBearer)?)),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_extract_bearer() {
        assert_eq!(extract_bearer(Some("Bearer abc.def.ghi")), Ok("abc.def.ghi"));
        assert_eq!(extract_bearer(Some("bearer abc")), Ok("abc"));
        assert_eq!(extract_bearer(None), Err(BearerError::Missing));
        assert_eq!(extract_bearer(Some("abc.def.ghi")), Err(BearerError::NotBearer));
        assert_eq!(extract_bearer(Some("Basic dXNlcjpwdw==")), Err(BearerError::NotBearer));
        assert_eq!(extract_bearer(Some("Bearer   ")), Err(BearerError::EmptyToken));
    }

    #[test]
    fn test_bearer_from_headers() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_from_headers(&headers), Err(BearerError::Missing));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer t0k3n"));
        assert_eq!(bearer_from_headers(&headers), Ok("t0k3n"));

        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_bytes(b"Bearer \xff").unwrap(),
        );
        assert_eq!(bearer_from_headers(&headers), Err(BearerError::NotBearer));
    }
}
