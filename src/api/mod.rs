/// HTTP query API served with axum.
///
/// `POST /search` takes `{query, k?}` and answers with the nearest chunks;
/// `GET /health` is a liveness probe.
pub mod handlers;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use axum::routing::{get, post};
use tracing::info;

use crate::search::SearchService;

/// Shared application state available to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub search: Arc<SearchService>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/search", post(handlers::search))
        .route("/search/", post(handlers::search))
        .route("/health", get(handlers::health))
        .with_state(state)
}

/// Serve until Ctrl-C.
pub async fn serve(state: AppState, bind_addr: &str) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    info!("Listening on http://{bind_addr}");
    info!("  POST /search");
    info!("  GET  /health");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("Shutting down");
        })
        .await
        .context("HTTP server error")?;

    Ok(())
}
