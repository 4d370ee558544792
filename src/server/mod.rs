//! HTTP surface: `POST /ask_pdf`, `GET /docs`, `GET /health`.
//!
//! The router holds one `Arc<QaPipeline>` as state. Handlers never mutate it;
//! each request renders its own document and runs its own agent, so requests
//! are isolated from one another.

mod docs;
mod dto;
mod error;
mod routes;

pub use docs::ApiDoc;
pub use dto::{AskResponse, ErrorResponse, HealthResponse};
pub use error::{status_for, ApiError, ServerError};

use crate::ask::QaPipeline;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Room for multipart framing and the question field on top of the file.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// Build the application router.
pub fn router(pipeline: Arc<QaPipeline>) -> Router {
    let body_limit = pipeline
        .settings()
        .max_upload_bytes
        .saturating_add(MULTIPART_OVERHEAD);

    Router::new()
        .route("/ask_pdf", post(routes::ask_pdf))
        .route("/health", get(routes::health))
        .route("/docs", get(routes::docs))
        .route("/openapi.json", get(routes::docs))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(pipeline)
}

/// Bind `addr` and serve until Ctrl-C.
pub async fn serve(pipeline: Arc<QaPipeline>, addr: &str) -> Result<(), ServerError> {
    info!(addr, "Binding HTTP server");
    let app = router(pipeline);

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind {
            addr: addr.to_string(),
            source,
        })?;
    info!(addr, "HTTP server ready to accept connections");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(ServerError::Serve)
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown signal received");
    }
}
