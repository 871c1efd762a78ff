use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tokio::sync::watch;
use tower::ServiceBuilder;
use tower_http::timeout::TimeoutLayer;

use crate::config::ServerConfig;
use crate::web::handlers::{ingest_logs, metrics, AppState};
use crate::web::middleware;

/// Builds the application router with the full middleware stack.
///
/// Layer order (outermost first): request id, request timeout, metrics,
/// completion log, panic recovery. Panics are therefore converted into the
/// fixed error response before metrics and logging observe the outcome.
pub fn router(state: AppState, server_config: &ServerConfig) -> Router {
    // One end-to-end budget per request, covering body read and response.
    let request_timeout =
        Duration::from_secs(server_config.read_timeout + server_config.write_timeout);

    Router::new()
        // The handler reads the body itself, stopping one byte past the
        // batch cap, so axum's own limit is disabled for this route.
        .route("/logs", post(ingest_logs).layer(DefaultBodyLimit::disable()))
        .route("/metrics", get(metrics))
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn(middleware::request_id))
                .layer(TimeoutLayer::new(request_timeout))
                .layer(axum::middleware::from_fn(middleware::track_metrics))
                .layer(axum::middleware::from_fn(middleware::log_completion))
                .layer(axum::middleware::from_fn(middleware::recover_panics)),
        )
        .with_state(state)
}

/// Serves the router until the shutdown signal fires, then drains
/// gracefully.
pub async fn run_server(
    state: AppState,
    server_config: ServerConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Result<(), std::io::Error> {
    let app = router(state, &server_config);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", server_config.port)).await?;
    tracing::info!(port = server_config.port, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.wait_for(|&fired| fired).await;
            tracing::info!("HTTP server shutting down gracefully");
        })
        .await
}
