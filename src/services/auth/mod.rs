//! Bearer-token authorization against a Keycloak realm.
//!
//! Layers, bottom-up: `jwks` (key source + shared cache), `verifier`
//! (signature and claims), `registry` + `roles` (per-endpoint policy) and
//! `provider`, which ties them together for transport adapters.
pub mod claims;
pub mod error;
pub mod factory;
pub mod identity;
pub mod jwks;
pub mod provider;
pub mod registry;
pub mod roles;
pub mod verifier;

pub use error::{AuthError, AuthErrorKind, InvalidTokenReason, KeyUnavailableReason};
pub use factory::build_auth_provider;
pub use identity::Identity;
pub use provider::{AuthOutcome, AuthProvider};
pub use registry::{EndpointDescriptor, EndpointRegistry, EndpointRule};
pub use verifier::TokenVerifier;
