use std::convert::Infallible;

use anyhow::{Context, Result};
use bytes::Bytes;
use http_body_util::BodyExt;
use http_body_util::combinators::BoxBody;
use hyper::{Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::AppState;
use crate::auth::password::hash_password;
use crate::auth::roles::{Role, join_role_list};
use crate::database::users::{self, NewUser};
use crate::handlers::utils::deliver_serialized_json;

/// Registration request data
#[derive(Debug, Clone, Deserialize)]
pub struct RegistrationData {
    pub username: String,
    pub email: String,
    pub password: String,
    /// Comma-separated role names, e.g. "ROLE_ADMIN,ROLE_USER".
    /// Absent or empty means the default member role.
    #[serde(default)]
    pub roles: Option<String>,
}

/// Registration response codes
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RegistrationResponse {
    Success {
        user_id: i64,
        username: String,
        email: String,
        roles: String,
        message: String,
    },
    Error {
        code: String,
        message: String,
    },
}

/// Error codes for registration
#[derive(Debug)]
pub enum RegistrationError {
    UsernameTaken,
    EmailTaken,
    InvalidUsername,
    InvalidPassword,
    InvalidEmail,
    InvalidRole(String),
    MissingField(String),
    DatabaseError,
    InternalError,
}

impl RegistrationError {
    fn to_code(&self) -> &'static str {
        match self {
            Self::UsernameTaken => "USERNAME_TAKEN",
            Self::EmailTaken => "EMAIL_TAKEN",
            Self::InvalidUsername => "INVALID_USERNAME",
            Self::InvalidPassword => "INVALID_PASSWORD",
            Self::InvalidEmail => "INVALID_EMAIL",
            Self::InvalidRole(_) => "INVALID_ROLE",
            Self::MissingField(_) => "MISSING_FIELD",
            Self::DatabaseError => "DATABASE_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    fn to_message(&self) -> String {
        match self {
            Self::UsernameTaken => "Username is already taken".to_string(),
            Self::EmailTaken => "Email is already registered".to_string(),
            Self::InvalidUsername => {
                "Username must be 3-20 characters, alphanumeric or underscores only".to_string()
            }
            Self::InvalidPassword => {
                "Password must be 8-128 characters with at least one letter and one number"
                    .to_string()
            }
            Self::InvalidEmail => "Invalid email format".to_string(),
            Self::InvalidRole(role) => format!("Unknown role: {}", role),
            Self::MissingField(field) => format!("Missing required field: {}", field),
            Self::DatabaseError => "Database error occurred".to_string(),
            Self::InternalError => "An internal error occurred".to_string(),
        }
    }

    fn to_response(&self) -> RegistrationResponse {
        RegistrationResponse::Error {
            code: self.to_code().to_string(),
            message: self.to_message(),
        }
    }
}

/// Main registration handler.
pub async fn handle_register(
    req: Request<hyper::body::Incoming>,
    state: AppState,
) -> Result<Response<BoxBody<Bytes, Infallible>>> {
    info!("Processing registration request");

    let registration_data = match parse_and_validate_registration(req).await {
        Ok(data) => data,
        Err(e) => {
            warn!("Registration validation failed: {:?}", e.to_code());
            return deliver_serialized_json(&e.to_response(), StatusCode::BAD_REQUEST);
        }
    };

    let roles = match normalize_roles(registration_data.roles.as_deref()) {
        Ok(roles) => roles,
        Err(e) => {
            warn!("Registration rejected: {:?}", e.to_code());
            return deliver_serialized_json(&e.to_response(), StatusCode::BAD_REQUEST);
        }
    };

    let hashed_password =
        hash_password(&registration_data.password).context("Failed to hash password")?;

    match attempt_registration(&registration_data, &hashed_password, &roles, &state).await {
        Ok(user_id) => {
            info!(
                "User registered successfully: {} (ID: {})",
                registration_data.username, user_id
            );

            let response = RegistrationResponse::Success {
                user_id,
                username: registration_data.username,
                email: registration_data.email,
                roles,
                message: "Registration successful".to_string(),
            };

            deliver_serialized_json(&response, StatusCode::CREATED)
        }
        Err(e) => {
            warn!("Registration failed: {:?}", e.to_code());
            let status = match e {
                RegistrationError::DatabaseError | RegistrationError::InternalError => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
                _ => StatusCode::BAD_REQUEST,
            };
            deliver_serialized_json(&e.to_response(), status)
        }
    }
}

/// Parse and validate the JSON registration body.
async fn parse_and_validate_registration(
    req: Request<hyper::body::Incoming>,
) -> std::result::Result<RegistrationData, RegistrationError> {
    let body = req
        .collect()
        .await
        .map_err(|_| RegistrationError::InternalError)?
        .to_bytes();

    let data = serde_json::from_slice::<RegistrationData>(&body).map_err(|e| {
        error!("Failed to parse registration JSON: {}", e);
        RegistrationError::MissingField("username, email and password".to_string())
    })?;

    validate_username(&data.username)?;
    validate_password(&data.password)?;

    if !is_valid_email(&data.email) {
        return Err(RegistrationError::InvalidEmail);
    }

    Ok(data)
}

/// Validate username format
fn validate_username(username: &str) -> std::result::Result<(), RegistrationError> {
    if username.is_empty() || username.len() < 3 || username.len() > 20 {
        return Err(RegistrationError::InvalidUsername);
    }
    if !username.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return Err(RegistrationError::InvalidUsername);
    }
    Ok(())
}

/// Validate password format
fn validate_password(password: &str) -> std::result::Result<(), RegistrationError> {
    if password.is_empty() || password.len() < 8 || password.len() > 128 {
        return Err(RegistrationError::InvalidPassword);
    }
    if !password.chars().any(|c| c.is_numeric()) {
        return Err(RegistrationError::InvalidPassword);
    }
    if !password.chars().any(|c| c.is_alphabetic()) {
        return Err(RegistrationError::InvalidPassword);
    }
    Ok(())
}

/// Basic email validation
fn is_valid_email(email: &str) -> bool {
    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 {
        return false;
    }
    let domain_parts: Vec<&str> = parts[1].split('.').collect();
    if domain_parts.len() < 2 {
        return false;
    }
    !parts[0].is_empty() && !parts[1].is_empty() && domain_parts.iter().all(|p| !p.is_empty())
}

/// Resolve the requested roles to the canonical stored form.
///
/// Unlike reads of already-stored roles, registration rejects unknown role
/// names outright rather than silently dropping them.
fn normalize_roles(raw: Option<&str>) -> std::result::Result<String, RegistrationError> {
    let raw = raw.unwrap_or("").trim();
    if raw.is_empty() {
        return Ok(Role::User.as_str().to_string());
    }

    let mut roles = Vec::new();
    for part in raw.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let role =
            Role::parse(part).ok_or_else(|| RegistrationError::InvalidRole(part.to_string()))?;
        roles.push(role);
    }

    if roles.is_empty() {
        return Ok(Role::User.as_str().to_string());
    }

    Ok(join_role_list(&roles.into_iter().collect()))
}

/// Attempt to register the user in the database
async fn attempt_registration(
    data: &RegistrationData,
    hashed_password: &str,
    roles: &str,
    state: &AppState,
) -> std::result::Result<i64, RegistrationError> {
    info!("Attempting registration for user: {}", data.username);

    let username_exists = users::username_exists(&state.db, data.username.clone())
        .await
        .map_err(|e| {
            error!("Database error checking username: {}", e);
            RegistrationError::DatabaseError
        })?;

    if username_exists {
        warn!("Username already taken: {}", data.username);
        return Err(RegistrationError::UsernameTaken);
    }

    let email_exists = users::email_exists(&state.db, data.email.clone())
        .await
        .map_err(|e| {
            error!("Database error checking email: {}", e);
            RegistrationError::DatabaseError
        })?;

    if email_exists {
        warn!("Email already registered: {}", data.email);
        return Err(RegistrationError::EmailTaken);
    }

    let user_id = users::create_user(
        &state.db,
        NewUser {
            username: data.username.clone(),
            email: data.email.clone(),
            password_hash: hashed_password.to_string(),
            roles: roles.to_string(),
        },
    )
    .await
    .map_err(|e| {
        error!("Database error creating user: {}", e);
        RegistrationError::DatabaseError
    })?;

    Ok(user_id)
}
