use std::convert::Infallible;

use anyhow::{Context, Result};
use bytes::Bytes;
use http_body_util::BodyExt;
use http_body_util::combinators::BoxBody;
use hyper::{Request, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::AppState;
use crate::auth::authenticate::authenticate;
use crate::handlers::utils::{deliver_api_error, deliver_error_json, deliver_serialized_json};

/// Login request data
#[derive(Debug, Deserialize)]
pub struct LoginData {
    pub email: String,
    pub password: String,
}

/// Successful login payload.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub status: &'static str,
    pub token: String,
    pub token_type: &'static str,
    pub expires_in: u64,
    pub username: String,
}

/// Main login handler.  Exchanges email + password for a signed token.
pub async fn handle_login(
    req: Request<hyper::body::Incoming>,
    state: AppState,
) -> Result<Response<BoxBody<Bytes, Infallible>>> {
    info!("Processing login request");

    let login_data = match parse_login_body(req).await {
        Ok(data) => data,
        Err(response) => return response,
    };

    match authenticate(&state.db, &login_data.email, &login_data.password).await {
        Ok(principal) => {
            let token = state
                .tokens
                .issue(&principal.subject)
                .context("Failed to issue token")?;

            info!("User logged in successfully: {}", principal.username);

            let response = LoginResponse {
                status: "success",
                token,
                token_type: "Bearer",
                expires_in: state.tokens.expiry_secs(),
                username: principal.username,
            };

            deliver_serialized_json(&response, StatusCode::OK)
        }
        Err(err) => {
            warn!("Login failed for {}: {}", login_data.email, err);
            deliver_api_error(&err)
        }
    }
}

/// Parse the JSON login body.  On failure the caller gets a ready-made
/// 400 response to return as-is.
async fn parse_login_body(
    req: Request<hyper::body::Incoming>,
) -> std::result::Result<LoginData, Result<Response<BoxBody<Bytes, Infallible>>>> {
    let body = match req.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!("Failed to read login body: {}", e);
            return Err(deliver_error_json(
                "BAD_REQUEST",
                "Failed to read request body",
                StatusCode::BAD_REQUEST,
            ));
        }
    };

    let data: LoginData = match serde_json::from_slice(&body) {
        Ok(data) => data,
        Err(e) => {
            warn!("Failed to parse login JSON: {}", e);
            return Err(deliver_error_json(
                "BAD_REQUEST",
                "Invalid JSON body: expected email and password",
                StatusCode::BAD_REQUEST,
            ));
        }
    };

    if data.email.trim().is_empty() || data.password.is_empty() {
        return Err(deliver_error_json(
            "MISSING_FIELD",
            "Email and password are required",
            StatusCode::BAD_REQUEST,
        ));
    }

    Ok(data)
}
