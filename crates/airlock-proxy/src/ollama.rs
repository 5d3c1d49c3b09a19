//! Reqwest client for an Ollama-compatible backend.
//!
//! Implements the `InferenceBackend` port over the Ollama HTTP API:
//! `GET /api/tags` for the catalog, `POST /api/chat` for buffered and
//! NDJSON-streaming exchanges. Ollama streams newline-delimited JSON;
//! the line framing here reassembles chunks across arbitrary byte
//! boundaries.

use airlock_core::{
    BackendError, ChatChunk, ChatMessage, ChatRequest, ChunkStream, InferenceBackend, ModelEntry,
};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures_util::{Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// HTTP client for a local Ollama-compatible server.
pub struct OllamaClient {
    client: Client,
    base_url: String,
}

impl OllamaClient {
    /// `base_url` is the server root, e.g. `http://localhost:11434`.
    pub fn new(base_url: impl Into<String>) -> anyhow::Result<Self> {
        let client = Client::builder().pool_max_idle_per_host(10).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { client, base_url })
    }

    async fn post_chat(&self, request: &ChatRequest, stream: bool) -> Result<reqwest::Response, BackendError> {
        let url = format!("{}/api/chat", self.base_url);
        let body = WireChatRequest { model: &request.model, messages: &request.messages, stream };
        debug!(url = %url, model = %request.model, stream, "forwarding chat to backend");
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|err| BackendError::Unreachable(err.to_string()))?;
        require_success(response).await
    }
}

#[async_trait]
impl InferenceBackend for OllamaClient {
    async fn list_models(&self) -> Result<Vec<ModelEntry>, BackendError> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|err| BackendError::Unreachable(err.to_string()))?;
        let payload: TagsPayload = require_success(response)
            .await?
            .json()
            .await
            .map_err(|err| BackendError::Malformed(err.to_string()))?;
        Ok(payload.models)
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatChunk, BackendError> {
        // The wire flag is forced off: whatever the caller's stream flag,
        // this path is one buffered round trip.
        self.post_chat(request, false)
            .await?
            .json()
            .await
            .map_err(|err| BackendError::Malformed(err.to_string()))
    }

    async fn chat_stream(&self, request: &ChatRequest) -> Result<ChunkStream, BackendError> {
        let response = self.post_chat(request, true).await?;
        Ok(ndjson_chunks(response.bytes_stream()).boxed())
    }
}

/// Outgoing `/api/chat` body. Borrowed so request clones stop at the
/// serializer.
#[derive(Serialize)]
struct WireChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct TagsPayload {
    #[serde(default)]
    models: Vec<ModelEntry>,
}

/// One NDJSON line as Ollama sends it: either a chunk or an in-band
/// `{"error": ...}` report.
#[derive(Debug, Deserialize)]
struct WireLine {
    #[serde(default)]
    error: Option<String>,
    #[serde(flatten)]
    chunk: ChatChunk,
}

async fn require_success(response: reqwest::Response) -> Result<reqwest::Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let detail = response.text().await.unwrap_or_default();
    Err(BackendError::BadStatus { status: status.as_u16(), detail })
}

/// State threaded through the `unfold` stream.
struct LineState<E> {
    stream: futures_util::stream::BoxStream<'static, Result<Bytes, E>>,
    buf: BytesMut,
    done: bool,
}

/// Reassemble an NDJSON byte stream into chat chunks.
///
/// Lines may arrive split across any byte boundary; blank lines are
/// skipped; malformed lines are logged and dropped; an in-band error line
/// or a transport failure ends the stream with an `Err` item; nothing is
/// yielded past the terminal chunk.
fn ndjson_chunks<S, E>(byte_stream: S) -> impl Stream<Item = Result<ChatChunk, BackendError>> + Send
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let state = LineState { stream: byte_stream.boxed(), buf: BytesMut::new(), done: false };

    futures_util::stream::unfold(state, |mut st| async move {
        if st.done {
            return None;
        }

        loop {
            if let Some(line_end) = find_newline(&st.buf) {
                let line = st.buf.split_to(line_end);
                match parse_line(&line) {
                    LineOutcome::Chunk(chunk) => {
                        st.done = chunk.is_terminal();
                        return Some((Ok(chunk), st));
                    }
                    LineOutcome::Error(message) => {
                        st.done = true;
                        return Some((Err(BackendError::Stream(message)), st));
                    }
                    LineOutcome::Skip => continue,
                }
            }

            match st.stream.next().await {
                Some(Ok(bytes)) => st.buf.extend_from_slice(&bytes),
                Some(Err(err)) => {
                    st.done = true;
                    return Some((Err(BackendError::Stream(err.to_string())), st));
                }
                None => {
                    // Flush a final unterminated line, then end.
                    st.done = true;
                    if st.buf.is_empty() {
                        return None;
                    }
                    let rest = st.buf.split_to(st.buf.len());
                    return match parse_line(&rest) {
                        LineOutcome::Chunk(chunk) => Some((Ok(chunk), st)),
                        LineOutcome::Error(message) => {
                            Some((Err(BackendError::Stream(message)), st))
                        }
                        LineOutcome::Skip => None,
                    };
                }
            }
        }
    })
}

enum LineOutcome {
    Chunk(ChatChunk),
    Error(String),
    Skip,
}

fn parse_line(line: &[u8]) -> LineOutcome {
    let text = String::from_utf8_lossy(line);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return LineOutcome::Skip;
    }
    match serde_json::from_str::<WireLine>(trimmed) {
        Ok(WireLine { error: Some(message), .. }) => LineOutcome::Error(message),
        Ok(WireLine { chunk, .. }) => LineOutcome::Chunk(chunk),
        Err(err) => {
            warn!(error = %err, "skipping malformed backend line");
            LineOutcome::Skip
        }
    }
}

/// Position just past the next newline, if the buffer holds one.
fn find_newline(buf: &BytesMut) -> Option<usize> {
    buf.iter().position(|&b| b == b'\n').map(|pos| pos + 1)
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use super::*;

    fn byte_stream(
        parts: Vec<&'static [u8]>,
    ) -> impl Stream<Item = Result<Bytes, Infallible>> + Send + 'static {
        futures_util::stream::iter(parts.into_iter().map(|part| Ok(Bytes::from_static(part))))
    }

    #[tokio::test]
    async fn lines_split_across_chunk_boundaries_reassemble() {
        let stream = byte_stream(vec![
            b"{\"message\":{\"role\":\"assistant\",\"content\":\"He",
            b"llo\"},\"done\":false}\n",
            b"{\"message\":{\"content\":\" there\"},\"done\":false}\n",
        ]);

        let chunks: Vec<_> = ndjson_chunks(stream).collect().await;
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].as_ref().unwrap().message.content, "Hello");
        assert_eq!(chunks[1].as_ref().unwrap().message.content, " there");
    }

    #[tokio::test]
    async fn nothing_is_yielded_past_the_terminal_chunk() {
        let stream = byte_stream(vec![
            b"{\"done\":false,\"message\":{\"content\":\"a\"}}\n{\"done\":true,\"eval_count\":3}\n",
            b"{\"done\":false,\"message\":{\"content\":\"never\"}}\n",
        ]);

        let chunks: Vec<_> = ndjson_chunks(stream).collect().await;
        assert_eq!(chunks.len(), 2);
        let last = chunks[1].as_ref().unwrap();
        assert!(last.is_terminal());
        assert_eq!(last.eval_count, 3);
    }

    #[tokio::test]
    async fn final_unterminated_line_is_flushed() {
        let stream = byte_stream(vec![b"{\"done\":true,\"eval_count\":9}"]);

        let chunks: Vec<_> = ndjson_chunks(stream).collect().await;
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].as_ref().unwrap().is_terminal());
    }

    #[tokio::test]
    async fn in_band_error_lines_become_stream_errors() {
        let stream = byte_stream(vec![
            b"{\"done\":false,\"message\":{\"content\":\"a\"}}\n",
            b"{\"error\":\"model not loaded\"}\n",
        ]);

        let chunks: Vec<_> = ndjson_chunks(stream).collect().await;
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].is_ok());
        let err = chunks[1].as_ref().unwrap_err();
        assert!(matches!(err, BackendError::Stream(message) if message == "model not loaded"));
    }

    #[tokio::test]
    async fn malformed_lines_are_dropped_not_fatal() {
        let stream = byte_stream(vec![
            b"not json at all\n",
            b"\n",
            b"{\"done\":true}\n",
        ]);

        let chunks: Vec<_> = ndjson_chunks(stream).collect().await;
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].as_ref().unwrap().is_terminal());
    }

    #[test]
    fn base_url_loses_trailing_slashes() {
        let client = OllamaClient::new("http://localhost:11434/").unwrap();
        assert_eq!(client.base_url, "http://localhost:11434");
    }
}
