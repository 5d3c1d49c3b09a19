//! Termination of processes the environment does not own handles for.

use async_trait::async_trait;

/// Why a process could not be terminated.
#[derive(Debug, thiserror::Error)]
pub enum TerminateError {
    /// The process was gone before the first signal. Sweeps treat this as
    /// a skip, not a kill.
    #[error("process {pid} not found")]
    NotFound { pid: u32 },

    #[error("not permitted to signal process {pid}")]
    PermissionDenied { pid: u32 },

    /// The process survived the forced kill within the polling window.
    #[error("process {pid} did not exit after SIGKILL")]
    Timeout { pid: u32 },

    #[error("signalling process {pid} failed: {reason}")]
    Signal { pid: u32, reason: String },

    #[error("process termination is not supported on this platform")]
    Unsupported,
}

/// Terminate and inspect processes by PID.
///
/// `terminate` is graceful-first: implementations send the polite signal,
/// wait a bounded interval for the process to disappear, and only then
/// escalate to a forced kill.
#[async_trait]
pub trait ProcessControl: Send + Sync {
    async fn terminate(&self, pid: u32) -> Result<(), TerminateError>;

    /// Best-effort process name for log lines and reports.
    fn process_name(&self, pid: u32) -> Option<String>;
}
