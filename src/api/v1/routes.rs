/*
 * Responsibility
 * - v1 URL layout
 * - Which routes require a token is decided by the endpoint registry, not here
 */
use axum::{Router, routing::get};

use crate::api::v1::handlers::{health::health, me::me};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/me", get(me))
}
