//! Reclaiming the ports the environment needs before services start.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use airlock_core::ports::{NetProbe, ProcessControl, TerminateError};
use serde::Serialize;
use tracing::{debug, info, warn};

/// Default settling delay after terminations so the OS releases the
/// sockets before anything rebinds them.
const DEFAULT_GRACE: Duration = Duration::from_secs(2);

/// Outcome of one reaping pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PortSweep {
    /// Port → PIDs successfully terminated on it. Ports where nothing was
    /// listening (or nothing could be killed) are absent.
    pub killed: BTreeMap<u16, Vec<u32>>,
    /// Human-readable notes for listeners that could not be acted on.
    pub failures: Vec<String>,
}

impl PortSweep {
    /// Total number of processes terminated across all ports.
    #[must_use]
    pub fn total_killed(&self) -> usize {
        self.killed.values().map(Vec::len).sum()
    }

    /// True when the pass neither killed anything nor hit a failure.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.killed.is_empty() && self.failures.is_empty()
    }
}

/// Frees target ports by terminating whatever is listening on them.
///
/// Strictly best-effort: a process that cannot be terminated is noted in
/// the sweep and the pass moves on. Reaping ports nobody listens on is a
/// no-op, so the pass is idempotent.
pub struct PortReaper {
    probe: Arc<dyn NetProbe>,
    control: Arc<dyn ProcessControl>,
    grace: Duration,
}

impl PortReaper {
    #[must_use]
    pub fn new(probe: Arc<dyn NetProbe>, control: Arc<dyn ProcessControl>) -> Self {
        Self { probe, control, grace: DEFAULT_GRACE }
    }

    #[must_use]
    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Terminate every resolvable listener on each target port.
    ///
    /// After a port's terminations are issued the pass waits the grace
    /// interval before moving on, giving the OS time to release the
    /// sockets. A total enumeration failure produces an empty sweep with
    /// the failure recorded; it never aborts the caller.
    pub async fn reap(&self, ports: &[u16]) -> PortSweep {
        let mut sweep = PortSweep::default();

        let listeners = match self.probe.listeners() {
            Ok(listeners) => listeners,
            Err(err) => {
                warn!(error = %err, "cannot enumerate listeners, skipping port sweep");
                sweep.failures.push(format!("listener enumeration failed: {err}"));
                return sweep;
            }
        };

        for &port in ports {
            let owners: BTreeSet<u32> = listeners
                .iter()
                .filter(|entry| entry.local_port == port)
                .filter_map(|entry| entry.pid)
                .collect();

            let unattributed = listeners
                .iter()
                .filter(|entry| entry.local_port == port && entry.pid.is_none())
                .count();
            if unattributed > 0 {
                debug!(port, count = unattributed, "listeners without a resolvable owner");
            }

            if owners.is_empty() {
                debug!(port, "port already free");
                continue;
            }

            let mut killed = Vec::new();
            for pid in owners {
                let name = self
                    .control
                    .process_name(pid)
                    .unwrap_or_else(|| "unknown".to_string());
                info!(port, pid, process = %name, "terminating listener");
                match self.control.terminate(pid).await {
                    Ok(()) => killed.push(pid),
                    Err(TerminateError::NotFound { .. }) => {
                        debug!(port, pid, "listener already gone");
                    }
                    Err(err) => {
                        warn!(port, pid, error = %err, "could not terminate listener");
                        sweep.failures.push(format!("port {port}: pid {pid}: {err}"));
                    }
                }
            }

            if !killed.is_empty() {
                info!(port, killed = killed.len(), "port cleared");
                sweep.killed.insert(port, killed);
                tokio::time::sleep(self.grace).await;
            }
        }

        sweep
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::test_support::{FailureMode, SyntheticHost};

    fn reaper(host: &Arc<SyntheticHost>) -> PortReaper {
        PortReaper::new(host.clone(), host.clone()).with_grace(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn terminates_listeners_and_groups_by_port() {
        let host = Arc::new(
            SyntheticHost::new()
                .listener(8080, Some(100))
                .listener(8080, Some(101))
                .listener(11434, Some(200))
                .listener(9999, Some(300)),
        );

        let sweep = reaper(&host).reap(&[8080, 11434]).await;

        assert_eq!(sweep.killed.get(&8080).unwrap(), &vec![100, 101]);
        assert_eq!(sweep.killed.get(&11434).unwrap(), &vec![200]);
        assert_eq!(sweep.total_killed(), 3);
        assert!(sweep.failures.is_empty());
        // The untargeted port is untouched.
        assert!(!host.terminated().contains(&300));
    }

    #[tokio::test]
    async fn reaping_is_idempotent() {
        let host = Arc::new(SyntheticHost::new().listener(8080, Some(100)));
        let reaper = reaper(&host);

        let first = reaper.reap(&[8080]).await;
        assert_eq!(first.total_killed(), 1);

        // The listener is gone from the table now, so a second pass finds
        // nothing and reports nothing.
        let second = reaper.reap(&[8080]).await;
        assert!(second.is_clean());
        assert_eq!(host.terminated(), vec![100]);
    }

    #[tokio::test]
    async fn ports_with_no_listeners_are_a_clean_noop() {
        let host = Arc::new(SyntheticHost::new());
        let sweep = reaper(&host).reap(&[8080, 11434]).await;
        assert!(sweep.is_clean());
        assert_eq!(sweep.total_killed(), 0);
    }

    #[tokio::test]
    async fn per_process_failures_are_recorded_not_fatal() {
        let host = Arc::new(
            SyntheticHost::new()
                .listener(8080, Some(100))
                .listener(8080, Some(101))
                .refusing(100, FailureMode::Denied),
        );

        let sweep = reaper(&host).reap(&[8080]).await;

        // The permitted kill still happened.
        assert_eq!(sweep.killed.get(&8080).unwrap(), &vec![101]);
        assert_eq!(sweep.failures.len(), 1);
        assert!(sweep.failures[0].contains("pid 100"));
    }

    #[tokio::test]
    async fn already_exited_listeners_are_skipped_silently() {
        let host = Arc::new(
            SyntheticHost::new()
                .listener(8080, Some(100))
                .refusing(100, FailureMode::NotFound),
        );

        let sweep = reaper(&host).reap(&[8080]).await;

        // Not killed, but not a failure either: the port is free.
        assert!(sweep.is_clean());
    }

    #[tokio::test]
    async fn enumeration_failure_is_reported_in_the_sweep() {
        let host = Arc::new(SyntheticHost::unreadable());
        let sweep = reaper(&host).reap(&[8080]).await;
        assert!(sweep.killed.is_empty());
        assert_eq!(sweep.failures.len(), 1);
        assert!(sweep.failures[0].contains("enumeration failed"));
    }

    #[tokio::test]
    async fn unattributed_listeners_are_left_alone() {
        let host = Arc::new(SyntheticHost::new().listener(8080, None));
        let sweep = reaper(&host).reap(&[8080]).await;
        assert!(sweep.is_clean());
        assert!(host.terminated().is_empty());
    }
}
