//! HTTP front door: HTML form, synchronous audio endpoints and the job API.

pub mod error;
pub mod handlers;
pub mod pages;
pub mod request_context;
pub mod state;

use axum::extract::Request;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

pub use error::{ApiError, PageError};
pub use state::AppState;

use crate::error::Result;
use request_context::{attach_request_context, REQUEST_ID_HEADER};

pub fn router(state: AppState) -> Router {
    let trace_layer = TraceLayer::new_for_http().make_span_with(|request: &Request| {
        let request_id = request
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("-");
        tracing::info_span!(
            "http_request",
            method = %request.method(),
            uri = %request.uri(),
            request_id = %request_id,
        )
    });

    Router::new()
        .route("/", get(handlers::home).post(handlers::submit_form))
        .route("/synthesize", post(handlers::synthesize_form))
        .route("/synthesize/", post(handlers::synthesize_form))
        .route("/api/synthesize", post(handlers::synthesize_json))
        .route("/api/jobs", post(handlers::create_job))
        .route("/api/jobs/{id}", get(handlers::get_job))
        .route("/jobs/{id}", get(handlers::job_page))
        .route("/download/{file_name}", get(handlers::download))
        .route("/health", get(handlers::health))
        .layer(trace_layer)
        .layer(middleware::from_fn(attach_request_context))
        .with_state(state)
}

/// Serve until `shutdown` is cancelled, then drain in-flight requests.
pub async fn serve(listener: TcpListener, state: AppState, shutdown: CancellationToken) -> Result<()> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "http server listening");
    }
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    Ok(())
}
