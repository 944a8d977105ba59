/*
 * Responsibility
 * - Config → dependencies → Router
 * - Middleware (request id / trace / timeout, access check)
 * - axum::serve()
 */
use std::{panic, process, time::Duration};

use anyhow::{Context, Result};
use axum::Router;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::services::auth::build_auth_provider;
use crate::services::cache::{CacheBackend, CacheClient};
use crate::state::AppState;
use crate::{api, middleware};

/// Headroom over the key fetch timeout for the whole request.
const REQUEST_TIMEOUT_MARGIN: Duration = Duration::from_secs(5);

fn init_tracing() {
    // RUST_LOG=info,keycloak_authz=debug,tower_http=debug cargo run
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn init_panic_hook(abort_on_panic: bool) {
    let default_hook = panic::take_hook();

    panic::set_hook(Box::new(move |info| {
        tracing::error!(?info, "panic");

        if abort_on_panic {
            process::abort();
        } else {
            default_hook(info);
        }
    }))
}

pub async fn run() -> Result<()> {
    init_tracing();
    let config = Config::from_env()?;

    init_panic_hook(!config.app_env.is_production());

    tracing::info!(
        "starting API in {:?} mode on {}",
        config.app_env,
        config.addr
    );

    let state = build_state(&config).await?;
    let request_timeout = config
        .keycloak
        .fetch_timeout
        .saturating_add(REQUEST_TIMEOUT_MARGIN);
    let app = build_router(state, request_timeout);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn build_state(config: &Config) -> Result<AppState> {
    let store = CacheBackend::connect(config.redis_url.as_deref())
        .await
        .context("failed to connect key-set store")?;

    tracing::info!(
        backend = store.backend_name(),
        jwks = %config.keycloak.public_jwk_uri,
        secure_endpoints = config.keycloak.secure_endpoints.len(),
        "auth provider configured"
    );

    let auth = build_auth_provider(&config.keycloak, store)
        .context("failed to build auth provider")?;

    Ok(AppState::new(auth))
}

/// Router with the access check on `/api/v1/*` and HTTP middleware on everything.
pub fn build_router(state: AppState, request_timeout: Duration) -> Router {
    let v1 = middleware::auth::access::apply(api::v1::routes(), state.clone());

    let router = Router::new().nest("/api/v1", v1).with_state(state);

    middleware::http::apply(router, request_timeout)
}
