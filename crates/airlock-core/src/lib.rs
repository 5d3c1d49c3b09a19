//! Core domain types and capability ports for airlock.
//!
//! This crate is adapter-free: it defines the configuration model, the
//! block-pattern matcher, the chat/model wire types, and the traits the
//! runtime and proxy crates implement against the operating system and the
//! inference backend. Everything OS- or HTTP-specific lives in
//! `airlock-runtime` and `airlock-proxy`.

#![deny(unused_crate_dependencies)]

pub mod chat;
pub mod config;
pub mod pattern;
pub mod ports;
pub mod util;

// Re-export commonly used types for convenience
pub use chat::{ChatChunk, ChatMessage, ChatRequest, ModelEntry};
pub use config::{
    CheckToggles, ConfigError, DEFAULT_BACKEND_URL, DEFAULT_PROXY_PORT, DEFAULT_TARGET_PORTS,
    EnvironmentConfig, ServiceSpec,
};
pub use pattern::BlockPattern;
pub use ports::{
    BackendError, ChunkStream, ConnectionRecord, InferenceBackend, NetProbe, NetProbeError,
    ProcessControl, SocketEntry, TerminateError,
};
pub use util::human_timestamp;
