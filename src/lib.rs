//! Keycloak bearer-token authorization for axum services.
//!
//! The core lives in [`services::auth`]: an [`AuthProvider`](services::auth::AuthProvider)
//! holds the registry of protected endpoints and a token verifier backed by a
//! shared, TTL-bounded cache of the realm's signing keys. [`middleware`] and
//! [`api`] wire it into an HTTP service.
pub mod api;
pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod services;
pub mod state;
