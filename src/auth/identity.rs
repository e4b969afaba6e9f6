use hyper::header::HeaderMap;
use tracing::{debug, warn};

use crate::AppState;
use crate::auth::principal::Principal;
use crate::database::users as db_users;
use crate::errors::ApiError;

/// Outcome of per-request identity resolution.
///
/// `Rejected` is the diagnostic middle ground between "no token" and "valid
/// token": a token WAS supplied but could not be honoured.  Route dispatch
/// treats it exactly like `Anonymous` (public routes must keep working), but
/// the reason is logged so failed auth attempts are visible instead of being
/// silently discarded.
#[derive(Debug)]
pub enum Identity {
    /// No bearer token on the request.
    Anonymous,

    /// A token was supplied but failed parsing, verification, subject
    /// resolution, or expiry.
    Rejected { reason: String },

    /// Token verified end-to-end; the principal is attached for the rest of
    /// the request's processing.
    Principal(Principal),
}

impl Identity {
    pub fn principal(&self) -> Option<&Principal> {
        match self {
            Identity::Principal(p) => Some(p),
            _ => None,
        }
    }
}

/// Extract the bearer token from an `Authorization` header.
/// Format: `Authorization: Bearer <token>`
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|auth| auth.strip_prefix("Bearer "))
        .map(str::to_string)
}

/// Resolve the request's identity: bearer token → subject → stored user →
/// full validation → principal.
///
/// Runs once per request, before any route handler.  Bad tokens never fail
/// the request — they degrade to an identity the role gate will reject on
/// protected routes while public routes proceed.  A credential-store
/// failure is NOT a bad token: it propagates as an error so the request
/// surfaces a 500, not a spurious 401.
pub async fn resolve_identity(headers: &HeaderMap, state: &AppState) -> Result<Identity, ApiError> {
    let Some(token) = bearer_token(headers) else {
        return Ok(Identity::Anonymous);
    };

    // Structure + signature check; expiry comes later via `validate` so the
    // rejection reason can distinguish the two.
    let subject = match state.tokens.extract_subject(&token) {
        Ok(subject) => subject,
        Err(e) => {
            warn!("Rejected bearer token: {}", e);
            return Ok(Identity::Rejected {
                reason: e.to_string(),
            });
        }
    };

    // The subject must still resolve to a stored user — roles live on the
    // user row, not in the token, so a deleted account has no authorities.
    let user = match db_users::get_user_by_email(&state.db, subject.clone()).await? {
        Some(user) => user,
        None => {
            warn!("Rejected bearer token: subject resolves to no stored user");
            return Ok(Identity::Rejected {
                reason: "token subject resolves to no stored user".to_string(),
            });
        }
    };

    if !state.tokens.validate(&token, &user.email) {
        warn!("Rejected bearer token for {}: expired or subject mismatch", user.username);
        return Ok(Identity::Rejected {
            reason: "token expired or subject mismatch".to_string(),
        });
    }

    debug!("Request authenticated as {} ({})", user.username, user.email);
    Ok(Identity::Principal(Principal::from_user(&user)))
}
