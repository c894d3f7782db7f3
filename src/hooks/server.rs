// Hooks HTTP server

use std::sync::Arc;

use axum::{
    routing::{get, post, put},
    Json, Router,
};
use tokio::{net::TcpListener, sync::mpsc::Sender};

use crate::{log::Logger, log_error, log_info};

use super::{
    get_queue_handler, on_forward_handler, on_publish_handler, on_unpublish_handler,
    post_evict_handler, put_blocking_handler, put_dispatcher_delay_handler,
    put_health_threshold_handler, HooksContext,
};

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Builds the router of the hooks server
pub fn make_hooks_router(context: Arc<HooksContext>) -> Router {
    Router::new()
        .route("/healthz", get(health_handler))
        .route("/api/v1/hooks/on_publish", post(on_publish_handler))
        .route("/api/v1/hooks/on_unpublish", post(on_unpublish_handler))
        .route("/api/v1/hooks/on_forward", post(on_forward_handler))
        .route("/api/v1/queue", get(get_queue_handler))
        .route("/api/v1/blocking", put(put_blocking_handler))
        .route("/api/v1/health/threshold", put(put_health_threshold_handler))
        .route("/api/v1/dispatcher/delay", put(put_dispatcher_delay_handler))
        .route("/api/v1/evict", post(post_evict_handler))
        .with_state(context)
}

/// Runs the hooks server
///
/// # Arguments
///
/// * `logger` - The logger
/// * `context` - State shared by the handlers
/// * `end_notifier` - Notified if the server stops
pub fn hooks_server(logger: Arc<Logger>, context: Arc<HooksContext>, end_notifier: Sender<()>) {
    tokio::spawn(async move {
        let listen_addr = context.config.get_tcp_listen_addr();

        let listener = match TcpListener::bind(&listen_addr).await {
            Ok(l) => l,
            Err(e) => {
                log_error!(logger, format!("Could not create TCP listener: {}", e));
                _ = end_notifier.send(()).await;
                return;
            }
        };

        log_info!(logger, format!("Listening on {}", listen_addr));

        if let Err(e) = axum::serve(listener, make_hooks_router(context)).await {
            log_error!(logger, format!("Hooks server error: {}", e));
        }

        _ = end_notifier.send(()).await;
    });
}
