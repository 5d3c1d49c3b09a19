//! Signal-based termination of processes we hold no handle for.
//!
//! The reaper and the connection guard act on PIDs discovered in the
//! socket tables, so termination goes through raw signals rather than
//! child handles: SIGTERM, a bounded wait for the process to disappear,
//! then SIGKILL.

use std::time::Duration;

use airlock_core::ports::{ProcessControl, TerminateError};
use async_trait::async_trait;
use sysinfo::{Pid, ProcessesToUpdate, System};
use tracing::{debug, warn};

/// Polls after SIGTERM before escalating (20 * 100ms = 2s).
const GRACEFUL_POLLS: u32 = 20;
/// Polls after SIGKILL before giving up (10 * 100ms = 1s).
const FORCED_POLLS: u32 = 10;
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// [`ProcessControl`] backed by Unix signals and sysinfo.
#[derive(Debug, Clone, Copy, Default)]
pub struct SignalProcessControl;

impl SignalProcessControl {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProcessControl for SignalProcessControl {
    async fn terminate(&self, pid: u32) -> Result<(), TerminateError> {
        terminate_by_pid(pid).await
    }

    fn process_name(&self, pid: u32) -> Option<String> {
        let target = Pid::from_u32(pid);
        let mut system = System::new();
        system.refresh_processes(ProcessesToUpdate::Some(&[target]), false);
        system.process(target).map(|process| process.name().to_string_lossy().into_owned())
    }
}

/// Check whether a PID exists using the null signal.
#[cfg(unix)]
#[must_use]
pub fn pid_exists(pid: u32) -> bool {
    use nix::sys::signal;
    use nix::unistd::Pid;

    match signal::kill(Pid::from_raw(pid as i32), None) {
        Ok(()) => true,
        Err(nix::errno::Errno::ESRCH) => false,
        // Process exists but we lack permission to signal it.
        Err(_) => true,
    }
}

#[cfg(not(unix))]
#[must_use]
pub fn pid_exists(_pid: u32) -> bool {
    false
}

#[cfg(unix)]
async fn terminate_by_pid(pid: u32) -> Result<(), TerminateError> {
    use nix::errno::Errno;
    use nix::sys::signal::{self, Signal};
    use nix::unistd::Pid;

    let target = Pid::from_raw(pid as i32);

    match signal::kill(target, Signal::SIGTERM) {
        Ok(()) => debug!(pid, "sent SIGTERM"),
        Err(Errno::ESRCH) => return Err(TerminateError::NotFound { pid }),
        Err(Errno::EPERM) => return Err(TerminateError::PermissionDenied { pid }),
        Err(err) => {
            return Err(TerminateError::Signal { pid, reason: err.to_string() });
        }
    }

    for _ in 0..GRACEFUL_POLLS {
        tokio::time::sleep(POLL_INTERVAL).await;
        if !pid_exists(pid) {
            debug!(pid, "process exited after SIGTERM");
            return Ok(());
        }
    }

    warn!(pid, "process ignored SIGTERM, sending SIGKILL");
    match signal::kill(target, Signal::SIGKILL) {
        // Exited between the polls and the kill: still a success.
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(Errno::EPERM) => return Err(TerminateError::PermissionDenied { pid }),
        Err(err) => {
            return Err(TerminateError::Signal { pid, reason: err.to_string() });
        }
    }

    for _ in 0..FORCED_POLLS {
        tokio::time::sleep(POLL_INTERVAL).await;
        if !pid_exists(pid) {
            debug!(pid, "process exited after SIGKILL");
            return Ok(());
        }
    }

    Err(TerminateError::Timeout { pid })
}

#[cfg(not(unix))]
async fn terminate_by_pid(_pid: u32) -> Result<(), TerminateError> {
    Err(TerminateError::Unsupported)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(unix)]
    fn pid_exists_for_self() {
        assert!(pid_exists(std::process::id()));
    }

    #[test]
    #[cfg(unix)]
    fn pid_exists_false_for_impossible_pid() {
        assert!(!pid_exists(999_999));
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn terminate_missing_pid_reports_not_found() {
        let control = SignalProcessControl::new();
        let err = control.terminate(999_999).await.unwrap_err();
        assert!(matches!(err, TerminateError::NotFound { pid: 999_999 }));
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn terminate_stops_a_sleeping_process() {
        let mut child = tokio::process::Command::new("sleep")
            .arg("30")
            .spawn()
            .expect("failed to spawn sleep");
        let pid = child.id().expect("child should have a pid");

        // Real targets are other parents' children and get reaped on exit;
        // as the parent here we must reap concurrently or the PID lingers
        // as a zombie and never disappears.
        let waiter = tokio::spawn(async move { child.wait().await });

        let control = SignalProcessControl::new();
        control.terminate(pid).await.expect("terminate should succeed");

        let status = waiter.await.unwrap().expect("wait should succeed");
        // Killed by signal, so no success status.
        assert!(!status.success());
        assert!(!pid_exists(pid));
    }

    #[test]
    fn process_name_resolves_for_self() {
        let control = SignalProcessControl::new();
        let name = control.process_name(std::process::id());
        assert!(name.is_some_and(|name| !name.is_empty()));
    }
}
