//! Router and request handlers.
//!
//! - `/` - runs the status pipeline, streams plain text
//! - `/healthz`, `/readiness` - liveness and readiness probes, body `OK`
//! - `/metrics` - Prometheus metrics in text format

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::extract::{MatchedPath, Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use futures::channel::mpsc;
use futures::StreamExt;
use tokio::net::TcpListener;
use tracing::info;

use crate::config::Config;
use crate::server::metrics::SharedMetrics;
use crate::server::shutdown::ShutdownSignal;
use crate::status::{run_status_report, ChannelSink};

/// State shared by all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub metrics: SharedMetrics,
}

/// Build the router for all endpoints.
fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(status))
        .route("/healthz", get(check))
        .route("/readiness", get(check))
        .route("/metrics", get(self::metrics))
        .layer(middleware::from_fn_with_state(state.clone(), track_http))
        .with_state(state)
}

/// Liveness and readiness probe handler.
///
/// Always answers `OK`; deliberately independent of Kafka reachability,
/// since a broker outage must not get the reporter restarted.
async fn check() -> &'static str {
    "OK"
}

/// Status handler: runs the pipeline in its own task and streams its
/// output as the response body, chunk by chunk as it is produced.
///
/// Every request gets a fresh Kafka client; failures surface as text in
/// the body, never as an HTTP error.
async fn status(State(state): State<AppState>) -> Response {
    let (tx, rx) = mpsc::channel::<String>(16);

    let kafka_config = state.config.kafka();
    let metrics = state.metrics.clone();
    tokio::spawn(async move {
        let mut sink = ChannelSink::new(tx);
        let outcome = run_status_report(kafka_config, &mut sink).await;
        metrics.record_report(outcome);
    });

    let body = Body::from_stream(rx.map(Ok::<String, Infallible>));
    ([(CONTENT_TYPE, "text/plain")], body).into_response()
}

/// Prometheus metrics handler.
async fn metrics(State(state): State<AppState>) -> Response {
    match state.metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [(CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("failed to encode metrics: {e}"),
        )
            .into_response(),
    }
}

/// Middleware recording request count and latency per matched route.
async fn track_http(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());
    let start = Instant::now();

    let response = next.run(request).await;

    state.metrics.record_http(
        &path,
        response.status().as_u16(),
        start.elapsed().as_secs_f64(),
    );
    response
}

/// Run the HTTP server until the shutdown signal fires.
///
/// Binding errors are returned to the caller and are fatal; once bound,
/// the server drains in-flight connections on shutdown.
pub async fn run_server(
    port: u16,
    state: AppState,
    mut shutdown: ShutdownSignal,
) -> Result<(), std::io::Error> {
    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    // Log after successful bind - the server is actually listening.
    info!(port = %port, "status server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.wait().await })
        .await
}
