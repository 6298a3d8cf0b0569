//! HTTP relay: keeps the model credential server-side and streams answers to clients.

pub mod handlers;

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::llm::AnthropicClient;

/// Shared across handlers.
pub struct AppState {
    pub llm: AnthropicClient,
}

/// API routes, plus the SPA build under `static_dir` for every other path.
pub fn router(state: AppState, static_dir: Option<&Path>) -> Router {
    let api = Router::new()
        .route("/health", get(handlers::health))
        .route("/api/extract-keywords", post(handlers::extract_keywords))
        .route("/api/chat/stream", post(handlers::chat_stream))
        .with_state(Arc::new(state));

    let app = match static_dir {
        Some(dir) => api.fallback_service(
            ServeDir::new(dir).fallback(ServeFile::new(dir.join("index.html"))),
        ),
        None => api,
    };

    app.layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

pub async fn serve(addr: SocketAddr, app: Router) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("listening on http://{}", listener.local_addr()?);
    info!("health check: http://{}/health", listener.local_addr()?);
    axum::serve(listener, app).await
}
