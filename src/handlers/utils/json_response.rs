use std::convert::Infallible;

use anyhow::{Result, anyhow};
use bytes::Bytes;
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full};
use hyper::{Response, StatusCode, header};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, error};

use crate::errors::ApiError;

/// Serialize any `Serialize` type and deliver it as a JSON response.
/// This is the primary helper all handlers should use instead of
/// writing their own one-off serialization + response-building blocks.
pub fn deliver_serialized_json<T: Serialize>(
    data: &T,
    status: StatusCode,
) -> Result<Response<BoxBody<Bytes, Infallible>>> {
    let json = serde_json::to_string(data)?;

    debug!("Delivering serialized JSON response, size: {} bytes", json.len());

    let response = Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Full::new(Bytes::from(json)).boxed())
        .map_err(|e| anyhow!("Failed to build JSON response: {}", e))?;

    Ok(response)
}

/// Delivers a JSON error response with the specified error code, message, and status.
pub fn deliver_error_json(
    error_code: &str,
    message: &str,
    status: StatusCode,
) -> Result<Response<BoxBody<Bytes, Infallible>>> {
    error!(
        "Delivering error JSON: {} - {} ({})",
        status.as_u16(),
        error_code,
        message
    );

    let error_json = json!({
        "status": "error",
        "code": error_code,
        "message": message
    });

    deliver_serialized_json(&error_json, status)
}

/// Delivers a success JSON response with optional data and message.
pub fn deliver_success_json<T: Serialize>(
    data: Option<T>,
    message: Option<&str>,
    status: StatusCode,
) -> Result<Response<BoxBody<Bytes, Infallible>>> {
    let mut body = json!({ "status": "success" });
    if let Some(d) = data {
        body["data"] = serde_json::to_value(d)?;
    }
    if let Some(m) = message {
        body["message"] = json!(m);
    }

    deliver_serialized_json(&body, status)
}

/// Map an [`ApiError`] to its JSON rejection response.
pub fn deliver_api_error(err: &ApiError) -> Result<Response<BoxBody<Bytes, Infallible>>> {
    deliver_error_json(err.code(), &err.to_string(), err.status())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_envelope_has_status_code_and_message() {
        let res = deliver_error_json("NOT_FOUND", "Post not found", StatusCode::NOT_FOUND).unwrap();
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            res.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
    }

    #[test]
    fn success_without_data_is_just_the_status_field() {
        let res = deliver_success_json::<()>(None, None, StatusCode::OK).unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[test]
    fn api_error_maps_to_its_status() {
        let res = deliver_api_error(&ApiError::NotOwner).unwrap();
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
    }
}
