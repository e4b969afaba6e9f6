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
use crate::database::posts::{self, PostDraft};
use crate::errors::ApiError;
use crate::handlers::utils::{
    deliver_api_error, deliver_error_json, deliver_serialized_json, deliver_success_json, path_id,
    query_param,
};

/// Incoming post payload for create and update.
#[derive(Debug, Deserialize)]
struct PostBody {
    title: String,
    content: String,
}

impl PostBody {
    fn into_draft(self) -> Option<PostDraft> {
        if self.title.trim().is_empty() || self.content.is_empty() {
            return None;
        }
        Some(PostDraft {
            title: self.title,
            content: self.content,
        })
    }
}

/// GET /api/posts — all posts, newest first.  Also serves the admin
/// listing, which differs only in its route gate.
pub async fn handle_list_posts(
    _req: Request<hyper::body::Incoming>,
    state: AppState,
    _principal: Principal,
) -> Result<Response<BoxBody<Bytes, Infallible>>> {
    let all = posts::list_posts(&state.db).await.map_err(ApiError::from);
    match all {
        Ok(list) => deliver_serialized_json(&list, StatusCode::OK),
        Err(err) => deliver_api_error(&err),
    }
}

/// GET /api/posts/:id
pub async fn handle_get_post(
    req: Request<hyper::body::Incoming>,
    state: AppState,
    _principal: Principal,
) -> Result<Response<BoxBody<Bytes, Infallible>>> {
    let Some(id) = path_id(req.uri().path(), 3) else {
        return invalid_id();
    };

    match posts::get_post(&state.db, id).await {
        Ok(Some(post)) => deliver_serialized_json(&post, StatusCode::OK),
        Ok(None) => deliver_api_error(&ApiError::NotFound("Post")),
        Err(e) => deliver_api_error(&ApiError::from(e)),
    }
}

/// POST /api/posts?username=...
///
/// The author is named by the `username` query parameter, not derived from
/// the principal.  The route gate has already ensured a valid principal;
/// this parameter selects the author row the post is attributed to.
pub async fn handle_create_post(
    req: Request<hyper::body::Incoming>,
    state: AppState,
    principal: Principal,
) -> Result<Response<BoxBody<Bytes, Infallible>>> {
    let Some(username) = query_param(req.uri().query(), "username") else {
        return missing_username();
    };

    let Some(draft) = parse_post_body(req).await? else {
        return invalid_body();
    };

    match posts::create_post(&state.db, draft, username.clone()).await {
        Ok(Some(post)) => {
            info!(
                "Post {} created by {} (principal {})",
                post.id, username, principal.username
            );
            deliver_serialized_json(&post, StatusCode::CREATED)
        }
        Ok(None) => deliver_api_error(&ApiError::NotFound("User")),
        Err(e) => deliver_api_error(&ApiError::from(e)),
    }
}

/// PUT /api/posts/:id?username=...
pub async fn handle_update_post(
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

    let Some(draft) = parse_post_body(req).await? else {
        return invalid_body();
    };

    match posts::update_post(&state.db, id, draft, username.clone()).await {
        Ok(Mutation::Applied(post)) => {
            info!("Post {} updated by {}", id, username);
            deliver_serialized_json(&post, StatusCode::OK)
        }
        Ok(Mutation::NotFound) => deliver_api_error(&ApiError::NotFound("Post")),
        Ok(Mutation::NotOwner) => {
            warn!("Post {} update denied: {} is not the author", id, username);
            deliver_api_error(&ApiError::NotOwner)
        }
        Err(e) => deliver_api_error(&ApiError::from(e)),
    }
}

/// DELETE /api/posts/:id?username=...
pub async fn handle_delete_post(
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

    match posts::delete_post(&state.db, id, username.clone()).await {
        Ok(Mutation::Applied(())) => {
            info!("Post {} deleted by {}", id, username);
            deliver_success_json::<()>(None, Some("Post deleted"), StatusCode::OK)
        }
        Ok(Mutation::NotFound) => deliver_api_error(&ApiError::NotFound("Post")),
        Ok(Mutation::NotOwner) => {
            warn!("Post {} delete denied: {} is not the author", id, username);
            deliver_api_error(&ApiError::NotOwner)
        }
        Err(e) => deliver_api_error(&ApiError::from(e)),
    }
}

async fn parse_post_body(req: Request<hyper::body::Incoming>) -> Result<Option<PostDraft>> {
    let body = match req.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!("Failed to read post body: {}", e);
            return Ok(None);
        }
    };

    match serde_json::from_slice::<PostBody>(&body) {
        Ok(parsed) => Ok(parsed.into_draft()),
        Err(e) => {
            warn!("Failed to parse post JSON: {}", e);
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
        "Expected JSON body with non-empty title and content",
        StatusCode::BAD_REQUEST,
    )
}
