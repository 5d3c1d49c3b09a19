//! Capability ports: the traits the runtime and proxy adapters implement.
//!
//! The orchestration logic never touches the OS socket tables, signals, or
//! the inference backend directly. It talks to these traits, which keeps
//! every sweep and relay testable against synthetic tables and scripted
//! backends.

mod inference;
mod net_probe;
mod process_control;

pub use inference::{BackendError, ChunkStream, InferenceBackend};
pub use net_probe::{ConnectionRecord, NetProbe, NetProbeError, SocketEntry};
pub use process_control::{ProcessControl, TerminateError};
