//! HTTP surface: router construction and server startup.
//!
//! Handlers receive their services through `AppState` behind an `Arc`;
//! nothing in this module is a process-wide singleton. Each request is
//! one sequential pipeline run with no shared mutable state.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::cli::{AppContext, ServeArgs};
use crate::core::extract::FileFilter;
use crate::core::gateway::AiGateway;
use crate::infra::config::load_config;

mod handlers;

/// Services shared by request handlers, constructed once at startup.
pub struct AppState {
    pub gateway: AiGateway,
    pub filter: FileFilter,
}

/// Build the axum router with all routes.
pub fn router(state: Arc<AppState>, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/ping", get(handlers::ping))
        .route("/upload", post(handlers::upload))
        .route("/upload-single", post(handlers::upload_single))
        .route("/fix", post(handlers::fix))
        .route("/download", post(handlers::download))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the API server. A missing model API key is fatal here: the
/// process cannot do anything useful without it.
pub fn run(args: &ServeArgs, _ctx: &AppContext) -> Result<()> {
    let config = load_config()?;

    let api_key = std::env::var("GEMINI_API_KEY")
        .context("GEMINI_API_KEY is not set; refusing to start")?;

    let gateway = AiGateway::new(api_key, &config.gateway)?;
    let state = Arc::new(AppState {
        gateway,
        filter: FileFilter::from_config(&config.filter),
    });

    let host = args
        .host
        .clone()
        .unwrap_or_else(|| config.server.host.clone());
    let port = args.port.unwrap_or(config.server.port);
    let addr = format!("{host}:{port}");

    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    runtime.block_on(async {
        let app = router(state, config.server.max_upload_bytes);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("failed to bind {addr}"))?;

        tracing::info!(%addr, "zipfix API listening");
        axum::serve(listener, app).await.context("server failed")
    })
}
