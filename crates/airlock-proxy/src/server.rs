//! Axum HTTP server for the loopback proxy.
//!
//! `bind_local` + `serve` run the proxy until the cancellation token
//! fires; `router` is exposed separately so tests and embedders can drive
//! the route tree without a socket.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Instant;

use airlock_core::InferenceBackend;
use anyhow::Context;
use axum::Router;
use axum::http::{HeaderValue, header};
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::info;

use crate::handlers;

/// Shared application state for the proxy server.
#[derive(Clone)]
pub struct AppState {
    /// Client for the local inference backend.
    pub backend: Arc<dyn InferenceBackend>,
    /// Server start instant, for the status endpoint's uptime.
    pub started: Instant,
}

/// Bind the proxy listener. The bind address is loopback and not
/// configurable; this server is never exposed beyond the machine.
pub async fn bind_local(port: u16) -> anyhow::Result<TcpListener> {
    let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
    TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind proxy listener on {addr}"))
}

/// Run the proxy on a pre-bound listener until `cancel` fires.
pub async fn serve(
    listener: TcpListener,
    backend: Arc<dyn InferenceBackend>,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let addr = listener.local_addr()?;
    info!("proxy listening on http://{addr}");

    axum::serve(listener, router(backend))
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await?;

    info!("proxy shut down");
    Ok(())
}

/// Build the full route tree with the CORS header layers applied.
///
/// The shared fallback handles both wrong-method requests on known paths
/// and unknown paths, so OPTIONS works everywhere and misses always get
/// the JSON 404.
pub fn router(backend: Arc<dyn InferenceBackend>) -> Router {
    let state = AppState { backend, started: Instant::now() };

    Router::new()
        .route("/", get(handlers::describe).fallback(handlers::endpoint_fallback))
        .route("/status", get(handlers::status).fallback(handlers::endpoint_fallback))
        .route("/models", get(handlers::models).fallback(handlers::endpoint_fallback))
        .route("/system", get(handlers::system_info).fallback(handlers::endpoint_fallback))
        .route("/chat", post(handlers::chat).fallback(handlers::endpoint_fallback))
        .fallback(handlers::endpoint_fallback)
        // Every response advertises the loopback-only CORS posture,
        // streaming and error paths included.
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("http://localhost:*"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static("GET, POST, OPTIONS"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static("Content-Type"),
        ))
        .with_state(state)
}
