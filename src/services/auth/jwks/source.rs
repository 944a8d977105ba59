//! Remote source of the identity provider's signing keys.
use std::time::Duration;

use async_trait::async_trait;
use jsonwebtoken::jwk::JwkSet;
use thiserror::Error;
use url::Url;

#[derive(Debug, Clone, Error)]
pub enum KeySourceError {
    #[error("http client setup failed: {0}")]
    Client(String),
    #[error("request failed: {0}")]
    Request(String),
    #[error("unexpected status {0}")]
    Status(u16),
    #[error("invalid key set document: {0}")]
    InvalidDocument(String),
}

/// Yields the provider's full signing-key set.
///
/// Called only on a key-set cache miss. Implementations do not cache.
#[async_trait]
pub trait KeySource: Send + Sync + 'static {
    // Short description for logs (URL, fixture name, ...).
    fn describe(&self) -> String;

    async fn fetch(&self) -> Result<JwkSet, KeySourceError>;
}

/// Fetches the JWKS document (`.../protocol/openid-connect/certs`) over HTTP(S).
#[derive(Debug, Clone)]
pub struct HttpKeySource {
    url: Url,
    http_client: reqwest::Client,
}

impl HttpKeySource {
    /// `request_timeout` bounds connect + body read of a single fetch.
    pub fn new(url: Url, request_timeout: Duration) -> Result<Self, KeySourceError> {
        let http_client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| KeySourceError::Client(e.to_string()))?;

        Ok(Self { url, http_client })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl KeySource for HttpKeySource {
    fn describe(&self) -> String {
        self.url.to_string()
    }

    async fn fetch(&self) -> Result<JwkSet, KeySourceError> {
        tracing::debug!(url = %self.url, "fetching JWKS");

        let response = self
            .http_client
            .get(self.url.clone())
            .send()
            .await
            .map_err(|e| {
                tracing::error!(url = %self.url, error = %e, "failed to fetch JWKS");
                KeySourceError::Request(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            tracing::error!(url = %self.url, status = %status, "JWKS endpoint returned error");
            return Err(KeySourceError::Status(status.as_u16()));
        }

        response.json::<JwkSet>().await.map_err(|e| {
            tracing::error!(url = %self.url, error = %e, "failed to parse JWKS response");
            KeySourceError::InvalidDocument(e.to_string())
        })
    }
}
