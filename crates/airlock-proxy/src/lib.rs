//! Loopback-only HTTP proxy between local editors and the inference
//! backend.
//!
//! The server binds `127.0.0.1` only and exposes a small JSON API: a
//! capability descriptor, backend status, the model catalog, host gauges,
//! and a chat relay with buffered and SSE-streaming modes. The backend is
//! reached through the `InferenceBackend` port from `airlock-core`, so
//! tests drive the full route tree against a scripted backend.

#![deny(unsafe_code)]

pub mod handlers;
pub mod models;
pub mod ollama;
pub mod server;
pub mod stream;
pub mod system;

pub use ollama::OllamaClient;
pub use server::{AppState, bind_local, router, serve};
