use tokio_rusqlite::Connection;
use tracing::{info, warn};

use crate::auth::password::verify_password;
use crate::auth::principal::Principal;
use crate::database::users as db_users;
use crate::errors::ApiError;

/// Verify an email/password pair against the credential store.
///
/// Unknown email and password mismatch both come back as
/// [`ApiError::InvalidCredentials`] — the caller cannot tell which factor
/// failed, so the endpoint cannot be used to enumerate accounts.
pub async fn authenticate(
    conn: &Connection,
    email: &str,
    password: &str,
) -> Result<Principal, ApiError> {
    let user = db_users::get_user_by_email(conn, email.to_string())
        .await?
        .ok_or_else(|| {
            warn!("Authentication failed: unknown email");
            ApiError::InvalidCredentials
        })?;

    let password_valid = verify_password(&user.password_hash, password)?;
    if !password_valid {
        warn!("Authentication failed: password mismatch for user {}", user.username);
        return Err(ApiError::InvalidCredentials);
    }

    info!("Authenticated user {} (ID: {})", user.username, user.id);

    Ok(Principal::from_user(&user))
}
