//! Bearer token → `AuthProvider::authorize` → `Identity` in request extensions.
//!
//! Endpoints are identified by HTTP method plus the matched route template
//! (e.g. `GET /api/v1/users/{id}`), falling back to the raw path when no
//! route matched. Unregistered endpoints pass through without a token.
//! `HEAD` requests are checked against the `GET` registration.

use axum::{
    Router,
    body::Body,
    extract::{MatchedPath, State},
    http::{Method, Request},
    middleware::{self, Next},
    response::Response,
};

use crate::error::AppError;
use crate::middleware::bearer_auth::bearer_from_headers;
use crate::services::auth::{AuthOutcome, EndpointDescriptor};
use crate::state::AppState;

/// Apply the access check to every route of `router`.
///
/// ```ignore
/// let v1 = api::v1::routes();
/// let v1 = middleware::auth::access::apply(v1, state.clone());
/// app = app.nest("/api/v1", v1);
/// ```
pub fn apply(router: Router<AppState>, state: AppState) -> Router<AppState> {
    router.layer(middleware::from_fn_with_state(state, access_middleware))
}

fn endpoint_of(req: &Request<Body>) -> EndpointDescriptor {
    let path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| req.uri().path().to_owned());

    // axum answers HEAD with the GET handler, so HEAD is checked as GET.
    let method = if req.method() == Method::HEAD {
        Method::GET
    } else {
        req.method().clone()
    };

    EndpointDescriptor::http(method.as_str(), path)
}

pub async fn access_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let endpoint = endpoint_of(&req);

    if !state.auth.is_secure_endpoint(&endpoint) {
        tracing::debug!(endpoint = %endpoint, "endpoint not protected");
        return Ok(next.run(req).await);
    }

    let token = match bearer_from_headers(req.headers()) {
        Ok(token) => token.to_owned(),
        Err(err) => {
            tracing::warn!(endpoint = %endpoint, error = %err, "failed to get authorization header");
            return Err(AppError::missing_credentials());
        }
    };

    match state.auth.authorize(&endpoint, &token).await {
        Ok(AuthOutcome::Authenticated(identity)) => {
            tracing::info!(endpoint = %endpoint, user = %identity.username, "authorization succeeded");
            req.extensions_mut().insert(identity);
        }
        // unregistered between the check above and now
        Ok(AuthOutcome::Unprotected) => {}
        Err(err) => {
            tracing::warn!(endpoint = %endpoint, kind = ?err.kind(), "authorization failed");
            return Err(err.into());
        }
    }

    Ok(next.run(req).await)
}
