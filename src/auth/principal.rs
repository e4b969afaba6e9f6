use std::collections::HashSet;

use crate::auth::roles::Role;
use crate::database::users::User;

/// The authenticated identity attached to a request.
///
/// Derived transiently per request from a validated token (or, at login,
/// from a verified credential pair) — never persisted, never cached across
/// requests.
#[derive(Debug, Clone)]
pub struct Principal {
    /// Token subject — the user's email.
    pub subject: String,

    /// Username, as the ownership gate compares against post/comment authors.
    pub username: String,

    /// Authorities parsed from the stored role string at user load time.
    pub roles: HashSet<Role>,
}

impl Principal {
    pub fn from_user(user: &User) -> Self {
        Self {
            subject: user.email.clone(),
            username: user.username.clone(),
            roles: user.roles.clone(),
        }
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }
}
