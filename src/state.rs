/*
 * Responsibility
 * - Shared context attached to the Router (AppState)
 * - Cheap to clone (Arc inside)
 */
use std::sync::Arc;

use crate::services::auth::AuthProvider;
use crate::services::cache::CacheBackend;

#[derive(Clone, Debug)]
pub struct AppState {
    pub auth: Arc<AuthProvider<CacheBackend>>,
}

impl AppState {
    pub fn new(auth: Arc<AuthProvider<CacheBackend>>) -> Self {
        Self { auth }
    }
}
