use hyper::StatusCode;
use thiserror::Error;

/// Request-terminal failures surfaced by the auth core and the domain
/// operations.  None of these are retried; each maps to exactly one HTTP
/// rejection class.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Unknown email or password mismatch.  Deliberately one variant for
    /// both so the response never reveals which factor failed.
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// Principal lacks the authority the route requires.
    #[error("Insufficient privileges")]
    Forbidden,

    /// Principal is not the author of the targeted post or comment.
    #[error("Not the author of this resource")]
    NotOwner,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Database error")]
    Database(#[from] tokio_rusqlite::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    /// Stable machine-readable code carried in the JSON error envelope.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::Forbidden => "FORBIDDEN",
            Self::NotOwner => "NOT_OWNER",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::Forbidden | Self::NotOwner => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_failure_is_unauthorized() {
        assert_eq!(ApiError::InvalidCredentials.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::InvalidCredentials.code(), "INVALID_CREDENTIALS");
    }

    #[test]
    fn ownership_failure_is_forbidden() {
        assert_eq!(ApiError::NotOwner.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn role_gate_failure_is_forbidden() {
        assert_eq!(ApiError::Forbidden.status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::Forbidden.code(), "FORBIDDEN");
    }

    #[test]
    fn database_failure_is_a_server_error() {
        let err = ApiError::Database(tokio_rusqlite::Error::ConnectionClosed);
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code(), "DATABASE_ERROR");
    }

    #[test]
    fn credential_message_does_not_name_the_failed_factor() {
        let msg = ApiError::InvalidCredentials.to_string();
        assert!(!msg.to_lowercase().contains("user"));
        assert!(!msg.to_lowercase().contains("unknown"));
    }

    #[test]
    fn not_found_names_the_resource() {
        assert_eq!(ApiError::NotFound("Post").to_string(), "Post not found");
    }
}
