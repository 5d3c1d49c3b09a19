//! Route handlers for the proxy API.
//!
//! Handlers parse, delegate to the backend port or the gauge sampler, and
//! map failures onto the flat JSON error bodies. Wire shapes live in
//! `models`; the streaming relay lives in `stream`.

use airlock_core::ChatRequest;
use axum::Json;
use axum::extract::State;
use axum::http::{Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use tracing::{debug, error, info};

use crate::models::{
    ChatEventPayload, ErrorBody, ModelsBody, ServiceDescriptor, StatusBody, UnknownRouteBody,
};
use crate::server::AppState;
use crate::{stream, system};

// ── GET / ──────────────────────────────────────────────────────────────

pub async fn describe() -> impl IntoResponse {
    debug!("GET /");
    Json(ServiceDescriptor::current())
}

// ── GET /status ────────────────────────────────────────────────────────

/// Live backend probe: reachability is whatever `list_models` says right
/// now, never a cached flag.
pub async fn status(State(state): State<AppState>) -> impl IntoResponse {
    debug!("GET /status");
    let backend_reachable = state.backend.list_models().await.is_ok();
    Json(StatusBody::new(backend_reachable, state.started.elapsed().as_secs()))
}

// ── GET /models ────────────────────────────────────────────────────────

pub async fn models(State(state): State<AppState>) -> Response {
    debug!("GET /models");
    match state.backend.list_models().await {
        Ok(models) => Json(ModelsBody::new(models)).into_response(),
        Err(err) => {
            error!(error = %err, "failed to list models");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorBody::new(err.to_string())))
                .into_response()
        }
    }
}

// ── GET /system ────────────────────────────────────────────────────────

pub async fn system_info() -> Response {
    debug!("GET /system");
    match system::sample().await {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(err) => {
            error!(error = %err, "system sampling failed");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorBody::new(err.to_string())))
                .into_response()
        }
    }
}

// ── POST /chat ─────────────────────────────────────────────────────────

pub async fn chat(State(state): State<AppState>, body: Bytes) -> Response {
    let request: ChatRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(err) => {
            error!(error = %err, "invalid /chat request");
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorBody::new(format!("Invalid request body: {err}"))),
            )
                .into_response();
        }
    };

    if request.messages.is_empty() {
        return (StatusCode::BAD_REQUEST, Json(ErrorBody::new("Messages are required")))
            .into_response();
    }

    info!(model = %request.model, streaming = request.stream, "POST /chat");

    if request.stream {
        stream::relay_chat(state.backend.clone(), request).await
    } else {
        buffered_chat(&state, &request).await
    }
}

async fn buffered_chat(state: &AppState, request: &ChatRequest) -> Response {
    match state.backend.chat(request).await {
        Ok(chunk) => Json(ChatEventPayload::new(chunk)).into_response(),
        Err(err) => {
            error!(model = %request.model, error = %err, "buffered chat failed");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorBody::new(err.to_string())))
                .into_response()
        }
    }
}

// ── Fallback ───────────────────────────────────────────────────────────

/// Terminal handler for everything unrouted: CORS preflights get a bare
/// 200, anything else gets a 404 echoing the path. Registered both as the
/// router fallback and as the method fallback on every route.
pub async fn endpoint_fallback(method: Method, uri: Uri) -> Response {
    if method == Method::OPTIONS {
        return StatusCode::OK.into_response();
    }
    debug!(%method, path = %uri.path(), "unknown route");
    (StatusCode::NOT_FOUND, Json(UnknownRouteBody::new(uri.path()))).into_response()
}
