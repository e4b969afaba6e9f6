use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;

use anyhow::{Context, Result};
use bytes::Bytes;
use http_body_util::combinators::BoxBody;
use hyper::{Method, Request, Response, StatusCode};
use tracing::warn;

use crate::AppState;
use crate::auth::identity::{Identity, resolve_identity};
use crate::auth::principal::Principal;
use crate::auth::roles::Role;
use crate::handlers::utils::json_response;
use crate::handlers::{auth, comments, posts};

// ---------------------------------------------------------------------------
// Handler type aliases
// ---------------------------------------------------------------------------
//
// Two handler shapes, three access tiers:
//
//   PublicHandler — no principal.  Receives (req, state).
//                   Use for: /api/register, /api/login, /health.
//
//   AuthedHandler — receives (req, state, principal).  The principal was
//                   attached by identity resolution and has already passed
//                   the route's gate; handlers never repeat the auth call.

type PublicHandler = Box<
    dyn Fn(
            Request<hyper::body::Incoming>,
            AppState,
        )
            -> Pin<Box<dyn Future<Output = Result<Response<BoxBody<Bytes, Infallible>>>> + Send>>
        + Send
        + Sync,
>;

type AuthedHandler = Box<
    dyn Fn(
            Request<hyper::body::Incoming>,
            AppState,
            Principal,
        )
            -> Pin<Box<dyn Future<Output = Result<Response<BoxBody<Bytes, Infallible>>>> + Send>>
        + Send
        + Sync,
>;

// ---------------------------------------------------------------------------
// Access policy + gate
// ---------------------------------------------------------------------------

/// The authority a route declares.  Evaluated by the router before the
/// handler runs — a failed gate short-circuits the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessPolicy {
    /// No authentication check.
    Public,

    /// Any attached principal, regardless of roles.
    Authenticated,

    /// Principal must hold this specific authority.
    Role(Role),
}

/// Why the role gate turned a request away.
#[derive(Debug, PartialEq, Eq)]
pub enum GateDenied {
    /// No principal attached (missing, malformed, expired, or unresolvable
    /// token).
    Unauthenticated,

    /// Principal attached but its authority set lacks the required role.
    Forbidden,
}

/// The declarative role gate.  Pure function of identity + policy so it can
/// be tested without a live request.
pub fn authorize<'a>(
    identity: &'a Identity,
    policy: AccessPolicy,
) -> std::result::Result<Option<&'a Principal>, GateDenied> {
    match policy {
        AccessPolicy::Public => Ok(identity.principal()),
        AccessPolicy::Authenticated => identity
            .principal()
            .map(Some)
            .ok_or(GateDenied::Unauthenticated),
        AccessPolicy::Role(role) => {
            let principal = identity.principal().ok_or(GateDenied::Unauthenticated)?;
            if principal.has_role(role) {
                Ok(Some(principal))
            } else {
                Err(GateDenied::Forbidden)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Route
// ---------------------------------------------------------------------------

enum RouteKind {
    Public(PublicHandler),
    Gated(AccessPolicy, AuthedHandler),
}

struct Route {
    method: Method,
    path: String,
    kind: RouteKind,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub struct Router {
    routes: Vec<Route>,
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("routes_count", &self.routes.len())
            .finish()
    }
}

impl Router {
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    // ── Public (no auth) ─────────────────────────────────────────────────────

    /// GET with no authentication — health checks and the like.
    pub fn get<F, Fut>(mut self, path: &str, handler: F) -> Self
    where
        F: Fn(Request<hyper::body::Incoming>, AppState) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response<BoxBody<Bytes, Infallible>>>> + Send + 'static,
    {
        self.routes.push(Route {
            method: Method::GET,
            path: path.to_string(),
            kind: RouteKind::Public(Box::new(move |req, state| Box::pin(handler(req, state)))),
        });
        self
    }

    /// POST with no authentication — register / login only.
    pub fn post<F, Fut>(mut self, path: &str, handler: F) -> Self
    where
        F: Fn(Request<hyper::body::Incoming>, AppState) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response<BoxBody<Bytes, Infallible>>>> + Send + 'static,
    {
        self.routes.push(Route {
            method: Method::POST,
            path: path.to_string(),
            kind: RouteKind::Public(Box::new(move |req, state| Box::pin(handler(req, state)))),
        });
        self
    }

    // ── Gated (policy checked before dispatch) ───────────────────────────────
    //
    // The router resolves identity once per request and evaluates the
    // route's policy before the handler is called.  Handlers receive the
    // admitted `Principal` and must NOT re-run any auth check.

    pub fn get_gated<F, Fut>(self, path: &str, policy: AccessPolicy, handler: F) -> Self
    where
        F: Fn(Request<hyper::body::Incoming>, AppState, Principal) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response<BoxBody<Bytes, Infallible>>>> + Send + 'static,
    {
        self.gated(Method::GET, path, policy, handler)
    }

    pub fn post_gated<F, Fut>(self, path: &str, policy: AccessPolicy, handler: F) -> Self
    where
        F: Fn(Request<hyper::body::Incoming>, AppState, Principal) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response<BoxBody<Bytes, Infallible>>>> + Send + 'static,
    {
        self.gated(Method::POST, path, policy, handler)
    }

    pub fn put_gated<F, Fut>(self, path: &str, policy: AccessPolicy, handler: F) -> Self
    where
        F: Fn(Request<hyper::body::Incoming>, AppState, Principal) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response<BoxBody<Bytes, Infallible>>>> + Send + 'static,
    {
        self.gated(Method::PUT, path, policy, handler)
    }

    pub fn delete_gated<F, Fut>(self, path: &str, policy: AccessPolicy, handler: F) -> Self
    where
        F: Fn(Request<hyper::body::Incoming>, AppState, Principal) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response<BoxBody<Bytes, Infallible>>>> + Send + 'static,
    {
        self.gated(Method::DELETE, path, policy, handler)
    }

    fn gated<F, Fut>(mut self, method: Method, path: &str, policy: AccessPolicy, handler: F) -> Self
    where
        F: Fn(Request<hyper::body::Incoming>, AppState, Principal) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response<BoxBody<Bytes, Infallible>>>> + Send + 'static,
    {
        self.routes.push(Route {
            method,
            path: path.to_string(),
            kind: RouteKind::Gated(
                policy,
                Box::new(move |req, state, principal| Box::pin(handler(req, state, principal))),
            ),
        });
        self
    }

    // ── Dispatch ──────────────────────────────────────────────────────────────

    pub async fn route(
        &self,
        req: Request<hyper::body::Incoming>,
        state: AppState,
    ) -> Result<Response<BoxBody<Bytes, Infallible>>> {
        let method = req.method().clone();
        let path = req.uri().path().to_string();

        // Identity resolution runs once, before any route matching, so every
        // tier sees the same verdict.  Public routes simply ignore it.  A
        // credential-store failure here is not an auth verdict at all — it
        // surfaces as the database error it is.
        let identity = match resolve_identity(req.headers(), &state).await {
            Ok(identity) => identity,
            Err(err) => {
                return json_response::deliver_api_error(&err)
                    .context("Failed to deliver identity error");
            }
        };

        for route in &self.routes {
            if route.method != method || !Self::path_matches(&route.path, &path) {
                continue;
            }

            return match &route.kind {
                RouteKind::Public(h) => h(req, state).await,

                RouteKind::Gated(policy, h) => match authorize(&identity, *policy) {
                    Ok(Some(principal)) => h(req, state, principal.clone()).await,
                    // Gated routes always carry a principal on success; a
                    // `Public` policy never reaches this arm.
                    Ok(None) => unauthorized(),
                    Err(GateDenied::Unauthenticated) => {
                        warn!("Rejected {} {}: no valid principal", method, path);
                        unauthorized()
                    }
                    Err(GateDenied::Forbidden) => {
                        warn!("Rejected {} {}: missing required authority", method, path);
                        forbidden()
                    }
                },
            };
        }

        json_response::deliver_error_json("NOT_FOUND", "Endpoint not found", StatusCode::NOT_FOUND)
            .context("Failed to deliver 404 response")
    }

    // ── Path matching ─────────────────────────────────────────────────────────

    pub fn path_matches(route_path: &str, request_path: &str) -> bool {
        // Strip query string from incoming request path before comparing.
        let clean = request_path.split('?').next().unwrap_or(request_path);

        // Exact match.
        if route_path == clean {
            return true;
        }

        // Segment-by-segment matching for `:param` wildcards.
        // e.g.  "/api/posts/:id"  matches  "/api/posts/42"
        let route_segs: Vec<&str> = route_path.split('/').collect();
        let path_segs: Vec<&str> = clean.split('/').collect();

        if route_segs.len() != path_segs.len() {
            return false;
        }

        route_segs
            .iter()
            .zip(path_segs.iter())
            .all(|(r, p)| r.starts_with(':') || r == p)
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn unauthorized() -> Result<Response<BoxBody<Bytes, Infallible>>> {
    json_response::deliver_error_json(
        "UNAUTHORIZED",
        "Authentication required",
        StatusCode::UNAUTHORIZED,
    )
    .context("Failed to deliver 401 response")
}

fn forbidden() -> Result<Response<BoxBody<Bytes, Infallible>>> {
    json_response::deliver_api_error(&crate::errors::ApiError::Forbidden)
        .context("Failed to deliver 403 response")
}

// ---------------------------------------------------------------------------
// API router
//
// Access policy is enforced here at the routing level — handlers MUST NOT
// repeat the check.  The contract is:
//
//   .get / .post                        → Public — handler gets (req, state)
//   .*_gated(path, Authenticated, ...)  → any principal — handler gets
//                                         (req, state, principal)
//   .*_gated(path, Role(r), ...)        → principal holding authority r
//
// Update/delete routes are deliberately `Authenticated`, not role-gated:
// the ownership check inside the post/comment operations is the second,
// independent gate that restricts them to the author.
// ---------------------------------------------------------------------------

pub fn build_api_router() -> Router {
    use AccessPolicy::{Authenticated, Role as RequireRole};

    Router::new()
        // ── Public: no auth ──────────────────────────────────────────────────
        .get("/health", |_req, _state| async move {
            json_response::deliver_serialized_json(
                &serde_json::json!({ "status": "success", "health": "ok" }),
                StatusCode::OK,
            )
        })
        .post("/api/register", |req, state| async move {
            auth::handle_register(req, state)
                .await
                .context("Register failed")
        })
        .post("/api/login", |req, state| async move {
            auth::handle_login(req, state).await.context("Login failed")
        })
        // ── Posts ────────────────────────────────────────────────────────────
        .get_gated("/api/posts", Authenticated, |req, state, principal| async move {
            posts::handle_list_posts(req, state, principal)
                .await
                .context("Post list failed")
        })
        .get_gated("/api/posts/:id", Authenticated, |req, state, principal| async move {
            posts::handle_get_post(req, state, principal)
                .await
                .context("Post get failed")
        })
        .post_gated("/api/posts", Authenticated, |req, state, principal| async move {
            posts::handle_create_post(req, state, principal)
                .await
                .context("Post create failed")
        })
        .put_gated("/api/posts/:id", Authenticated, |req, state, principal| async move {
            posts::handle_update_post(req, state, principal)
                .await
                .context("Post update failed")
        })
        .delete_gated("/api/posts/:id", Authenticated, |req, state, principal| async move {
            posts::handle_delete_post(req, state, principal)
                .await
                .context("Post delete failed")
        })
        // ── Comments ─────────────────────────────────────────────────────────
        .get_gated("/api/comments", Authenticated, |req, state, principal| async move {
            comments::handle_list_comments(req, state, principal)
                .await
                .context("Comment list failed")
        })
        .get_gated("/api/comments/:id", Authenticated, |req, state, principal| async move {
            comments::handle_get_comment(req, state, principal)
                .await
                .context("Comment get failed")
        })
        .post_gated("/api/comments", Authenticated, |req, state, principal| async move {
            comments::handle_create_comment(req, state, principal)
                .await
                .context("Comment create failed")
        })
        .put_gated("/api/comments/:id", Authenticated, |req, state, principal| async move {
            comments::handle_update_comment(req, state, principal)
                .await
                .context("Comment update failed")
        })
        .delete_gated("/api/comments/:id", Authenticated, |req, state, principal| async move {
            comments::handle_delete_comment(req, state, principal)
                .await
                .context("Comment delete failed")
        })
        // ── Admin: specific authority required ───────────────────────────────
        .get_gated(
            "/api/admin/posts",
            RequireRole(Role::Admin),
            |req, state, principal| async move {
                posts::handle_list_posts(req, state, principal)
                    .await
                    .context("Admin post list failed")
            },
        )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
