use std::sync::Arc;

use tokio_rusqlite::Connection;

pub mod auth;
pub mod config;
pub mod database;
pub mod errors;
pub mod handlers;

use auth::tokens::TokenService;
use config::AppConfig;

/// Shared per-process state handed to every request handler.
///
/// Everything in here is either read-only after startup (`config`, the
/// signing secret inside `tokens`) or serialises its own access (`db` runs
/// all SQL on a dedicated worker thread), so cloning this into each
/// connection task needs no further synchronisation.
#[derive(Clone)]
pub struct AppState {
    /// SQLite handle — the credential store and the post/comment store.
    pub db: Connection,

    /// Issues and verifies the HS256 bearer tokens.
    pub tokens: TokenService,

    /// Immutable configuration loaded at startup.
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(db: Connection, tokens: TokenService, config: AppConfig) -> Self {
        Self {
            db,
            tokens,
            config: Arc::new(config),
        }
    }
}
