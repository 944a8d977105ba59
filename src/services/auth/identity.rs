use serde::Serialize;
use uuid::Uuid;

/// Verified caller identity produced by a successful token verification.
///
/// - `user_id` is the token subject, already checked to be a UUID v4.
/// - `roles` are the roles granted to the configured client only
///   (realm-wide roles are not carried).
/// - Rebuilt from the token on every call; never cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub roles: Vec<String>,
    pub user_id: Uuid,
    pub email: String,
    pub username: String,
    pub name: String,
    pub family_name: String,
}

impl Identity {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}
