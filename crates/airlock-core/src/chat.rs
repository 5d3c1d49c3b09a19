//! Chat and model-catalog wire types shared by the proxy and the backend
//! client.
//!
//! Field names follow the Ollama chat API. Every chunk field is defaulted
//! so partial streaming chunks (which omit the timing counters until the
//! terminal chunk) deserialize without special cases.

use serde::{Deserialize, Serialize};

/// One turn of a conversation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub content: String,
}

impl ChatMessage {
    #[must_use]
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self { role: role.into(), content: content.into() }
    }
}

/// A chat request as accepted by the proxy and forwarded to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub stream: bool,
}

/// One backend chat chunk.
///
/// For a buffered exchange the backend sends exactly one chunk with
/// `done: true` and the timing counters filled in. For a streaming
/// exchange every intermediate chunk carries a message fragment and the
/// terminal chunk repeats the counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatChunk {
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub message: ChatMessage,
    #[serde(default)]
    pub done: bool,
    /// Wall-clock nanoseconds for the whole exchange.
    #[serde(default)]
    pub total_duration: u64,
    /// Nanoseconds spent loading the model.
    #[serde(default)]
    pub load_duration: u64,
    #[serde(default)]
    pub prompt_eval_count: u64,
    #[serde(default)]
    pub eval_count: u64,
}

impl ChatChunk {
    /// Whether this chunk closes the exchange.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        self.done
    }
}

/// A locally installed model, normalised for the `/models` endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelEntry {
    pub name: String,
    #[serde(default)]
    pub digest: String,
    /// On-disk size in bytes.
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub modified_at: String,
}
