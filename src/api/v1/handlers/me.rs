/*
 * Responsibility
 * - GET /me: echo the verified caller (user id, names, client roles)
 */
use axum::Json;

use crate::api::v1::extractors::CurrentIdentity;
use crate::services::auth::Identity;

pub async fn me(CurrentIdentity(identity): CurrentIdentity) -> Json<Identity> {
    Json(identity)
}
