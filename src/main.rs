use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::{TokioIo, TokioTimer};
use tokio::net::TcpListener;
use tokio_rusqlite::Connection;
use tracing::{error, info};

use blog_server::AppState;
use blog_server::auth::tokens::TokenService;
use blog_server::config::load_config;
use blog_server::database::create::create_tables;
use blog_server::handlers::routes::build_api_router;
use blog_server::handlers::api_conn;

#[derive(Parser, Debug)]
#[command(name = "blog-server", about = "JSON blog API with token auth")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();

    let config = load_config(&args.config).context("Failed to load configuration")?;

    // Validation already guaranteed this resolves; re-checked here so the
    // secret never leaves this scope as an Option.
    let secret = config
        .auth
        .resolved_jwt_secret()
        .context("JWT secret missing after validation")?;

    let db = Connection::open(&config.database.path)
        .await
        .with_context(|| format!("Failed to open database at {}", config.database.path))?;
    create_tables(&db).await.context("Failed to run schema setup")?;
    info!("Database ready at {}", config.database.path);

    let tokens = TokenService::new(secret, config.auth.token_expiry_minutes);

    let addr = config.server.addr();
    let state = AppState::new(db, tokens, config);
    let router = Arc::new(build_api_router());

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Listening on http://{}", addr);

    loop {
        let (stream, peer) = listener.accept().await.context("Accept failed")?;
        let io = TokioIo::new(stream);

        let state = state.clone();
        let router = Arc::clone(&router);

        tokio::task::spawn(async move {
            let service = service_fn(move |req| {
                let state = state.clone();
                let router = Arc::clone(&router);
                async move { api_conn(req, state, router).await }
            });

            if let Err(err) = http1::Builder::new()
                .timer(TokioTimer::new())
                .serve_connection(io, service)
                .await
            {
                error!("Error serving connection from {}: {:?}", peer, err);
            }
        });
    }
}
