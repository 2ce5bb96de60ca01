//! HTTP front end: `GET /feeds/{source}?...` and `GET /health`.

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::fetch::Fetcher;
use crate::handler::{handle, Context};
use crate::source::Params;

pub fn create_router<F: Fetcher + 'static>(ctx: Arc<Context<F>>) -> Router {
    Router::new()
        .route("/feeds/{source}", get(feed::<F>))
        .route("/health", get(health))
        .with_state(ctx)
}

async fn feed<F: Fetcher + 'static>(
    State(ctx): State<Arc<Context<F>>>,
    Path(source): Path<String>,
    Query(params): Query<Params>,
) -> axum::response::Response {
    let response = handle(&*ctx, &source, &params).await;
    let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        [(header::CONTENT_TYPE, response.content_type)],
        response.body,
    )
        .into_response()
}

async fn health() -> &'static str {
    "ok"
}

/// Serves until Ctrl-C.
pub async fn run_server<F: Fetcher + 'static>(
    listener: TcpListener,
    ctx: Arc<Context<F>>,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!("Starting server on {}", addr);
    }
    axum::serve(listener, create_router(ctx))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
