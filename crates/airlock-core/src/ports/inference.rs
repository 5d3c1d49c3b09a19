//! The local inference backend as seen by the proxy.

use async_trait::async_trait;
use futures_core::stream::BoxStream;

use crate::chat::{ChatChunk, ChatRequest, ModelEntry};

/// Stream of chat chunks from a streaming exchange.
pub type ChunkStream = BoxStream<'static, Result<ChatChunk, BackendError>>;

/// Failures talking to the inference backend.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// No TCP-level conversation happened at all.
    #[error("backend unreachable: {0}")]
    Unreachable(String),

    #[error("backend returned status {status}: {detail}")]
    BadStatus { status: u16, detail: String },

    #[error("malformed backend payload: {0}")]
    Malformed(String),

    /// The exchange started but the chunk stream broke mid-flight.
    #[error("backend stream failed: {0}")]
    Stream(String),
}

/// Chat and model-catalog operations against the local backend.
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    /// Locally installed models, normalised for the catalog endpoint.
    async fn list_models(&self) -> Result<Vec<ModelEntry>, BackendError>;

    /// One buffered exchange: the reply is the single terminal chunk.
    async fn chat(&self, request: &ChatRequest) -> Result<ChatChunk, BackendError>;

    /// Open a streaming exchange. The stream ends after the terminal
    /// chunk; mid-flight failures surface as `Err` items.
    async fn chat_stream(&self, request: &ChatRequest) -> Result<ChunkStream, BackendError>;
}
