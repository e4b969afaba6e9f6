use std::convert::Infallible;

use anyhow::Result;
use bytes::Bytes;
use http_body_util::BodyExt;
use http_body_util::combinators::BoxBody;
use hyper::{Request, Response, StatusCode};
use serde::Deserialize;
use tracing::{info, warn};

use crate::AppState;
use crate::auth::principal::Principal;
use crate::database::Mutation;
use crate::database::comments::{self, CommentCreate};
use crate::errors::ApiError;
use crate::handlers::utils::{
    deliver_api_error, deliver_error_json, deliver_serialized_json, deliver_success_json, path_id,
    query_param,
};

/// Incoming comment payload — the target post is named by the `post_id`
/// query parameter on create, so the body carries content only.
#[derive(Debug, Deserialize)]
struct CommentBody {
    content: String,
}

/// GET /api/comments?post_id=... — comments on one post, oldest first.
pub async fn handle_list_comments(
    req: Request<hyper::body::Incoming>,
    state: AppState,
    _principal: Principal,
) -> Result<Response<BoxBody<Bytes, Infallible>>> {
    let post_id = query_param(req.uri().query(), "post_id").and_then(|v| v.parse::<i64>().ok());
    let Some(post_id) = post_id else {
        return deliver_error_json(
            "MISSING_PARAM",
            "Query parameter 'post_id' is required and must be a number",
            StatusCode::BAD_REQUEST,
        );
    };

    match comments::comments_for_post(&state.db, post_id).await {
        Ok(list) => deliver_serialized_json(&list, StatusCode::OK),
        Err(e) => deliver_api_error(&ApiError::from(e)),
    }
}

/// GET /api/comments/:id
pub async fn handle_get_comment(
    req: Request<hyper::body::Incoming>,
    state: AppState,
    _principal: Principal,
) -> Result<Response<BoxBody<Bytes, Infallible>>> {
    let Some(id) = path_id(req.uri().path(), 3) else {
        return invalid_id();
    };

    match comments::get_comment(&state.db, id).await {
        Ok(Some(comment)) => deliver_serialized_json(&comment, StatusCode::OK),
        Ok(None) => deliver_api_error(&ApiError::NotFound("Comment")),
        Err(e) => deliver_api_error(&ApiError::from(e)),
    }
}

/// POST /api/comments?post_id=...&username=...
///
/// The query names both the target post and the author, same parameter
/// convention as the post routes; the body carries the content.
pub async fn handle_create_comment(
    req: Request<hyper::body::Incoming>,
    state: AppState,
    principal: Principal,
) -> Result<Response<BoxBody<Bytes, Infallible>>> {
    let post_id = query_param(req.uri().query(), "post_id").and_then(|v| v.parse::<i64>().ok());
    let Some(post_id) = post_id else {
        return deliver_error_json(
            "MISSING_PARAM",
            "Query parameter 'post_id' is required and must be a number",
            StatusCode::BAD_REQUEST,
        );
    };
    let Some(username) = query_param(req.uri().query(), "username") else {
        return missing_username();
    };

    let Some(content) = parse_comment_body(req).await? else {
        return invalid_body();
    };

    match comments::create_comment(&state.db, post_id, content, username.clone()).await {
        Ok(CommentCreate::Created(comment)) => {
            info!(
                "Comment {} created on post {} by {} (principal {})",
                comment.id, comment.post_id, username, principal.username
            );
            deliver_serialized_json(&comment, StatusCode::CREATED)
        }
        Ok(CommentCreate::PostMissing) => deliver_api_error(&ApiError::NotFound("Post")),
        Ok(CommentCreate::AuthorMissing) => deliver_api_error(&ApiError::NotFound("User")),
        Err(e) => deliver_api_error(&ApiError::from(e)),
    }
}

/// PUT /api/comments/:id?username=...
pub async fn handle_update_comment(
    req: Request<hyper::body::Incoming>,
    state: AppState,
    _principal: Principal,
) -> Result<Response<BoxBody<Bytes, Infallible>>> {
    let Some(id) = path_id(req.uri().path(), 3) else {
        return invalid_id();
    };
    let Some(username) = query_param(req.uri().query(), "username") else {
        return missing_username();
    };

    let Some(content) = parse_comment_body(req).await? else {
        return invalid_body();
    };

    match comments::update_comment(&state.db, id, content, username.clone()).await {
        Ok(Mutation::Applied(comment)) => {
            info!("Comment {} updated by {}", id, username);
            deliver_serialized_json(&comment, StatusCode::OK)
        }
        Ok(Mutation::NotFound) => deliver_api_error(&ApiError::NotFound("Comment")),
        Ok(Mutation::NotOwner) => {
            warn!("Comment {} update denied: {} is not the author", id, username);
            deliver_api_error(&ApiError::NotOwner)
        }
        Err(e) => deliver_api_error(&ApiError::from(e)),
    }
}

/// DELETE /api/comments/:id?username=...
pub async fn handle_delete_comment(
    req: Request<hyper::body::Incoming>,
    state: AppState,
    _principal: Principal,
) -> Result<Response<BoxBody<Bytes, Infallible>>> {
    let Some(id) = path_id(req.uri().path(), 3) else {
        return invalid_id();
    };
    let Some(username) = query_param(req.uri().query(), "username") else {
        return missing_username();
    };

    match comments::delete_comment(&state.db, id, username.clone()).await {
        Ok(Mutation::Applied(())) => {
            info!("Comment {} deleted by {}", id, username);
            deliver_success_json::<()>(None, Some("Comment deleted"), StatusCode::OK)
        }
        Ok(Mutation::NotFound) => deliver_api_error(&ApiError::NotFound("Comment")),
        Ok(Mutation::NotOwner) => {
            warn!("Comment {} delete denied: {} is not the author", id, username);
            deliver_api_error(&ApiError::NotOwner)
        }
        Err(e) => deliver_api_error(&ApiError::from(e)),
    }
}

async fn parse_comment_body(req: Request<hyper::body::Incoming>) -> Result<Option<String>> {
    let body = match req.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!("Failed to read comment body: {}", e);
            return Ok(None);
        }
    };

    match serde_json::from_slice::<CommentBody>(&body) {
        Ok(parsed) if !parsed.content.trim().is_empty() => Ok(Some(parsed.content)),
        Ok(_) => Ok(None),
        Err(e) => {
            warn!("Failed to parse comment JSON: {}", e);
            Ok(None)
        }
    }
}

fn missing_username() -> Result<Response<BoxBody<Bytes, Infallible>>> {
    deliver_error_json(
        "MISSING_PARAM",
        "Query parameter 'username' is required",
        StatusCode::BAD_REQUEST,
    )
}

fn invalid_id() -> Result<Response<BoxBody<Bytes, Infallible>>> {
    deliver_error_json(
        "INVALID_ID",
        "Path id must be a number",
        StatusCode::BAD_REQUEST,
    )
}

fn invalid_body() -> Result<Response<BoxBody<Bytes, Infallible>>> {
    deliver_error_json(
        "INVALID_BODY",
        "Expected JSON body with non-empty content",
        StatusCode::BAD_REQUEST,
    )
}
