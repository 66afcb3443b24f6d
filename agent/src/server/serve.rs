//! HTTP server setup

use std::future::Future;
use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::app::options::ServerOptions;
use crate::errors::AgentError;
use crate::server::handlers::{
    compose_action_handler, compose_list_handler, docker_action_handler, docker_list_handler,
    docker_update_handler, health_handler, logs_handler, not_found, os_version_handler,
    scan_handler, ssh_not_found, ssh_setkey_handler, status_handler, update_ack, update_handler,
    wifi_ack, wifi_handler,
};
use crate::server::state::ServerState;

/// Build the application router
pub fn router(state: Arc<ServerState>, max_bundle_bytes: usize) -> Router {
    Router::new()
        // Health and device state
        .route("/health", get(health_handler))
        .route("/status", get(status_handler).post(status_handler))
        .route("/version", get(os_version_handler))
        // Network
        .route("/wifi", get(wifi_ack).post(wifi_handler))
        .route("/getScan", get(scan_handler))
        // Services
        .route(
            "/compose",
            get(compose_list_handler)
                .post(compose_action_handler)
                .fallback(not_found),
        )
        .route(
            "/docker",
            get(docker_list_handler)
                .post(docker_action_handler)
                .fallback(not_found),
        )
        .route(
            "/docker-update",
            get(docker_update_handler).fallback(not_found),
        )
        // Firmware
        .route(
            "/update",
            get(update_ack)
                .post(update_handler)
                .layer(DefaultBodyLimit::max(max_bundle_bytes)),
        )
        // SSH and logs
        .route(
            "/ssh-setkey",
            post(ssh_setkey_handler).fallback(ssh_not_found),
        )
        .route("/logs", get(logs_handler))
        // State and middleware
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Start the HTTP server
pub async fn serve(
    options: &ServerOptions,
    state: Arc<ServerState>,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<JoinHandle<Result<(), AgentError>>, AgentError> {
    let app = router(state, options.max_bundle_bytes);

    let addr = format!("{}:{}", options.host, options.port);
    info!("Starting HTTP server on {}", addr);

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| AgentError::ServerError(e.to_string()))?;

    let handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(|e| AgentError::ServerError(e.to_string()))
    });

    Ok(handle)
}
