//! HTTP intake for worker completion callbacks.
//!
//! The worker reports each task's outcome by posting `{task_id, status}`.
//! The handler only validates and forwards; all state changes happen in the
//! scheduler loop.

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use tokio_util::sync::CancellationToken;

use super::scheduler::SchedulerHandle;
use super::task::TaskCallback;

/// Router exposing the callback endpoint at `path`.
pub fn router(path: &str, handle: SchedulerHandle) -> Router {
    Router::new()
        .route(path, post(receive_callback))
        .with_state(handle)
}

async fn receive_callback(
    State(handle): State<SchedulerHandle>,
    body: Bytes,
) -> (StatusCode, String) {
    let callback: TaskCallback = match serde_json::from_slice(&body) {
        Ok(callback) => callback,
        Err(e) => {
            tracing::warn!("[callback] rejected malformed body: {e}");
            return (StatusCode::BAD_REQUEST, e.to_string());
        }
    };

    crate::log_event!(
        "callback",
        "received",
        "{} {:?}",
        callback.task_id,
        callback.status
    );

    // Forward off the request path so a busy scheduler never stalls the worker
    tokio::spawn(async move {
        if let Err(e) = handle.complete(callback).await {
            tracing::warn!("[callback] dropped: {e}");
        }
    });

    (StatusCode::OK, "ok".to_string())
}

/// Serve the callback endpoint until `shutdown` is cancelled.
pub async fn serve(
    bind: &str,
    path: &str,
    handle: SchedulerHandle,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    crate::log_event!("callback", "listening", "http://{bind}{path}");

    axum::serve(listener, router(path, handle))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    crate::log_event!("callback", "stopped");
    Ok(())
}
