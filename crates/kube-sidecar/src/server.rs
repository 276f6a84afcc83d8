//! HTTP endpoint exposing the validity metric.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use tokio_util::sync::CancellationToken;

use crate::error::SidecarError;
use crate::metrics::PrometheusValidity;

/// Builds the router serving the registry at `path`.
pub fn metrics_router(validity: Arc<PrometheusValidity>, path: &str) -> Router {
    let path = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    };
    Router::new()
        .route(&path, get(metrics_handler))
        .with_state(validity)
}

/// Serves metrics on `0.0.0.0:port` until `shutdown` is cancelled.
pub async fn serve_metrics(
    validity: Arc<PrometheusValidity>,
    port: u16,
    path: &str,
    shutdown: CancellationToken,
) -> Result<(), SidecarError> {
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .map_err(|e| SidecarError::Serve { port, source: e })?;
    log::info!("Start http server for Prometheus '0.0.0.0:{}{}'", port, path);

    axum::serve(listener, metrics_router(validity, path))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| SidecarError::Serve { port, source: e })
}

async fn metrics_handler(State(validity): State<Arc<PrometheusValidity>>) -> (StatusCode, String) {
    match validity.encode() {
        Ok(body) => (StatusCode::OK, body),
        Err(e) => {
            log::error!("Could not encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, String::new())
        }
    }
}
