pub mod auth;
pub mod comments;
pub mod posts;
pub mod routes;
pub mod utils;

use std::convert::Infallible;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full};
use hyper::{Request, Response, StatusCode};
use tracing::error;

use crate::AppState;
use routes::Router;

/// Per-request entry point handed to hyper's `service_fn`.
///
/// Router errors are handler bugs or serialization failures, never client
/// mistakes; they collapse to an opaque 500 so internals stay off the wire.
pub async fn api_conn(
    req: Request<hyper::body::Incoming>,
    state: AppState,
    router: Arc<Router>,
) -> Result<Response<BoxBody<Bytes, Infallible>>, Infallible> {
    match router.route(req, state).await {
        Ok(response) => Ok(response),
        Err(err) => {
            error!("Request handling failed: {:#}", err);
            Ok(internal_error_response())
        }
    }
}

fn internal_error_response() -> Response<BoxBody<Bytes, Infallible>> {
    let body = r#"{"status":"error","code":"INTERNAL_ERROR","message":"An internal error occurred"}"#;
    let mut response = Response::new(Full::new(Bytes::from(body)).boxed());
    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    response.headers_mut().insert(
        hyper::header::CONTENT_TYPE,
        hyper::header::HeaderValue::from_static("application/json"),
    );
    response
}
