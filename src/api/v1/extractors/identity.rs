use axum::extract::FromRequestParts;
use axum::http::{StatusCode, request::Parts};

use crate::services::auth::Identity;
use crate::state::AppState;

/// Handler-side access to the caller's `Identity`.
///
/// The access middleware inserts it into request extensions for protected
/// endpoints. Missing (endpoint not registered, or middleware not applied) → 401.
#[derive(Debug, Clone)]
pub struct CurrentIdentity(pub Identity);

impl FromRequestParts<AppState> for CurrentIdentity
where
    AppState: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .map(CurrentIdentity)
            .ok_or(StatusCode::UNAUTHORIZED)
    }
}
