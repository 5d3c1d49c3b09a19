//! Streaming chat relay: backend chunks in, SSE events out.
//!
//! One task drains the backend stream into a bounded channel and the
//! response body drains the channel, so backend pacing and client socket
//! backpressure stay decoupled. A client that disconnects drops the
//! receiver, the next send fails, and the drain task stops pulling from
//! the backend.

use std::io;
use std::sync::Arc;

use airlock_core::{ChatRequest, InferenceBackend};
use axum::Json;
use axum::body::Body;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures_util::StreamExt;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

use crate::models::{ChatEventPayload, ErrorBody};

/// Backpressure bound between the drain task and the client body.
const EVENT_CHANNEL_CAPACITY: usize = 32;

/// Open a streaming exchange and relay it as `data: <json>\n\n` events.
///
/// A backend that refuses the exchange outright is a plain 500; once the
/// stream is open, failures surface as a final error event instead.
pub async fn relay_chat(
    backend: Arc<dyn InferenceBackend>,
    request: ChatRequest,
) -> Response {
    let mut chunks = match backend.chat_stream(&request).await {
        Ok(chunks) => chunks,
        Err(err) => {
            warn!(model = %request.model, error = %err, "backend refused streaming exchange");
            return (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorBody::new(err.to_string())))
                .into_response();
        }
    };

    let (tx, rx) = mpsc::channel::<Result<Bytes, io::Error>>(EVENT_CHANNEL_CAPACITY);

    tokio::spawn(async move {
        while let Some(item) = chunks.next().await {
            match item {
                Ok(chunk) => {
                    let terminal = chunk.is_terminal();
                    let event = sse_event(&ChatEventPayload::new(chunk));
                    if tx.send(Ok(event)).await.is_err() {
                        debug!("client went away mid-stream, dropping backend stream");
                        return;
                    }
                    if terminal {
                        return;
                    }
                }
                Err(err) => {
                    warn!(error = %err, "backend stream failed mid-flight");
                    let _ = tx.send(Ok(sse_event(&ErrorBody::new(err.to_string())))).await;
                    return;
                }
            }
        }
        debug!("backend stream ended without a terminal chunk");
    });

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::CONNECTION, "keep-alive")
        .body(Body::from_stream(ReceiverStream::new(rx)))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

/// One self-contained SSE frame.
fn sse_event<T: Serialize>(payload: &T) -> Bytes {
    let json = serde_json::to_string(payload).unwrap_or_else(|_| "{}".to_string());
    Bytes::from(format!("data: {json}\n\n"))
}
