//! HTTP exposure of the worker's metrics snapshot.

use tickwatch_core::{MetricsSnapshot, WorkerMetrics};

/// Spawn the metrics HTTP server on the given port.
///
/// Returns a `JoinHandle` that resolves when the server shuts down.
pub fn spawn_metrics_server(
    port: u16,
    metrics: WorkerMetrics,
    shutdown: tokio::sync::watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let app = axum::Router::new()
            .route("/metrics", axum::routing::get(metrics_handler))
            .with_state(metrics);

        let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
        let listener = match tokio::net::TcpListener::bind(addr).await {
            Ok(l) => l,
            Err(e) => {
                tracing::error!(port, error = %e, "failed to bind metrics HTTP server");
                return;
            }
        };

        tracing::info!(port, "metrics HTTP server listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let mut rx = shutdown;
                while !*rx.borrow() {
                    if rx.changed().await.is_err() {
                        break;
                    }
                }
            })
            .await
            .ok();

        tracing::info!("metrics HTTP server stopped");
    })
}

/// `GET /metrics` → JSON snapshot.
async fn metrics_handler(
    axum::extract::State(metrics): axum::extract::State<WorkerMetrics>,
) -> axum::Json<MetricsSnapshot> {
    axum::Json(metrics.snapshot())
}
