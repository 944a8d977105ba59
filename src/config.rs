/*
 * Responsibility
 * - Load settings from the environment (.env supported)
 * - Validate them up front (missing or malformed values fail startup)
 */
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use url::Url;

use crate::services::auth::jwks::{CacheWritePolicy, DEFAULT_OPERATION_TIMEOUT, DEFAULT_REFRESH_TTL};
use crate::services::auth::registry::{EndpointRule, parse_rules};

pub const MAX_REFRESH_JWK_TIMEOUT: Duration = Duration::from_secs(30 * 24 * 3600);
pub const MAX_FETCH_TIMEOUT: Duration = Duration::from_secs(5 * 60);
pub const MAX_TOKEN_LEEWAY_SECONDS: u64 = 3600;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    fn parse(raw: Option<String>) -> Self {
        match raw
            .unwrap_or_else(|| "development".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "missing configuration: {}", key),
            ConfigError::Invalid(key) => write!(f, "invalid configuration: {}", key),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Identity-provider settings.
#[derive(Debug, Clone)]
pub struct KeycloakConfig {
    pub public_jwk_uri: Url,
    pub client_id: String,
    pub refresh_jwk_timeout: Duration,
    pub fetch_timeout: Duration,
    pub token_leeway_seconds: u64,
    pub cache_write_policy: CacheWritePolicy,
    pub secure_endpoints: Vec<EndpointRule>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub app_env: AppEnv,
    /// `None` keeps the key set in process memory.
    pub redis_url: Option<String>,
    pub keycloak: KeycloakConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup (`from_env` passes `std::env::var`).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port: u16 = lookup("PORT")
            .and_then(|s| s.parse().ok())
            .unwrap_or(3000);

        let addr: SocketAddr = SocketAddr::from_str(&format!("0.0.0.0:{}", port))
            .map_err(|_| ConfigError::Invalid("PORT"))?;

        let app_env = AppEnv::parse(lookup("APP_ENV"));

        let redis_url = lookup("REDIS_URL").filter(|s| !s.trim().is_empty());

        let public_jwk_uri = lookup("KEYCLOAK_PUBLIC_JWK_URI")
            .ok_or(ConfigError::Missing("KEYCLOAK_PUBLIC_JWK_URI"))?;
        let public_jwk_uri = Url::parse(&public_jwk_uri)
            .map_err(|_| ConfigError::Invalid("KEYCLOAK_PUBLIC_JWK_URI"))?;

        let client_id = lookup("KEYCLOAK_CLIENT_ID")
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::Missing("KEYCLOAK_CLIENT_ID"))?;

        let refresh_jwk_timeout = duration_var(
            lookup("KEYCLOAK_REFRESH_JWK_TIMEOUT"),
            "KEYCLOAK_REFRESH_JWK_TIMEOUT",
            DEFAULT_REFRESH_TTL,
            MAX_REFRESH_JWK_TIMEOUT,
        )?;

        let fetch_timeout = duration_var(
            lookup("KEYCLOAK_FETCH_TIMEOUT"),
            "KEYCLOAK_FETCH_TIMEOUT",
            DEFAULT_OPERATION_TIMEOUT,
            MAX_FETCH_TIMEOUT,
        )?;

        let token_leeway_seconds = match lookup("KEYCLOAK_TOKEN_LEEWAY_SECONDS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs <= MAX_TOKEN_LEEWAY_SECONDS)
                .ok_or(ConfigError::Invalid("KEYCLOAK_TOKEN_LEEWAY_SECONDS"))?,
            None => 0,
        };

        let cache_write_policy = match lookup("KEYCLOAK_CACHE_WRITE_POLICY") {
            Some(raw) => parse_write_policy(&raw)
                .ok_or(ConfigError::Invalid("KEYCLOAK_CACHE_WRITE_POLICY"))?,
            None => CacheWritePolicy::default(),
        };

        let secure_endpoints = match lookup("KEYCLOAK_SECURE_ENDPOINTS") {
            Some(raw) => {
                parse_rules(&raw).map_err(|_| ConfigError::Invalid("KEYCLOAK_SECURE_ENDPOINTS"))?
            }
            None => Vec::new(),
        };

        Ok(Self {
            addr,
            app_env,
            redis_url,
            keycloak: KeycloakConfig {
                public_jwk_uri,
                client_id,
                refresh_jwk_timeout,
                fetch_timeout,
                token_leeway_seconds,
                cache_write_policy,
                secure_endpoints,
            },
        })
    }
}

/// Non-zero and at most `max`; `default` when unset.
fn duration_var(
    raw: Option<String>,
    key: &'static str,
    default: Duration,
    max: Duration,
) -> Result<Duration, ConfigError> {
    match raw {
        Some(raw) => parse_duration(&raw)
            .filter(|d| !d.is_zero() && *d <= max)
            .ok_or(ConfigError::Invalid(key)),
        None => Ok(default),
    }
}

/// `3h`, `90m`, `45s` or bare seconds.
pub fn parse_duration(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    let (digits, unit_secs) = match raw.as_bytes().last()? {
        b'h' => (&raw[..raw.len() - 1], 3600),
        b'm' => (&raw[..raw.len() - 1], 60),
        b's' => (&raw[..raw.len() - 1], 1),
        _ => (raw, 1),
    };
    let value: u64 = digits.parse().ok()?;
    value.checked_mul(unit_secs).map(Duration::from_secs)
}

fn parse_write_policy(raw: &str) -> Option<CacheWritePolicy> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "fail-closed" | "closed" => Some(CacheWritePolicy::FailClosed),
        "fail-open" | "open" => Some(CacheWritePolicy::FailOpen),
        _ => None,
    }
}
