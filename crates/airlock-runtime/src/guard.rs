//! Severing live connections to blocked remote endpoints.

use std::sync::Arc;

use airlock_core::BlockPattern;
use airlock_core::ports::{NetProbe, ProcessControl};
use serde::Serialize;
use tracing::{debug, error, info, warn};

/// How a guard sweep ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GuardOutcome {
    /// Nothing matched a block pattern.
    Clean,
    /// At least one connection owner was terminated.
    Severed,
    /// The connection table could not be enumerated at all.
    Failed { error: String },
}

impl GuardOutcome {
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Result of one guard sweep. Partial failures (skipped connections,
/// refused terminations) never fail the sweep; only total enumeration
/// failure does, and even that is carried in the report rather than
/// raised.
#[derive(Debug, Clone, Serialize)]
pub struct GuardReport {
    #[serde(flatten)]
    pub outcome: GuardOutcome,
    /// Successful terminations only.
    pub terminated: u32,
    /// Every pattern the sweep evaluated, echoed for the report.
    pub checked_patterns: Vec<String>,
}

/// Scans ESTABLISHED connections and terminates the owners of any whose
/// remote endpoint matches a block pattern.
pub struct ConnectionGuard {
    probe: Arc<dyn NetProbe>,
    control: Arc<dyn ProcessControl>,
}

impl ConnectionGuard {
    #[must_use]
    pub fn new(probe: Arc<dyn NetProbe>, control: Arc<dyn ProcessControl>) -> Self {
        Self { probe, control }
    }

    /// One best-effort pass over the current connection table.
    ///
    /// Remote endpoints are matched in string form against every pattern,
    /// first match wins. Connections without a resolvable owner are
    /// logged and skipped, as are terminations the OS refuses.
    pub async fn sweep(&self, patterns: &[BlockPattern]) -> GuardReport {
        let checked_patterns: Vec<String> =
            patterns.iter().map(|pattern| pattern.as_str().to_string()).collect();

        let connections = match self.probe.established() {
            Ok(connections) => connections,
            Err(err) => {
                error!(error = %err, "cannot enumerate established connections");
                return GuardReport {
                    outcome: GuardOutcome::Failed { error: err.to_string() },
                    terminated: 0,
                    checked_patterns,
                };
            }
        };

        let mut terminated = 0u32;
        for connection in connections {
            let remote_ip = connection.remote.ip().to_string();
            let Some(pattern) = patterns.iter().find(|pattern| pattern.matches(&remote_ip))
            else {
                continue;
            };

            let Some(pid) = connection.pid else {
                debug!(
                    remote = %connection.remote,
                    pattern = %pattern,
                    "matched connection has no resolvable owner, skipping"
                );
                continue;
            };

            let name =
                self.control.process_name(pid).unwrap_or_else(|| "unknown".to_string());
            warn!(
                remote = %connection.remote,
                pid,
                process = %name,
                pattern = %pattern,
                "severing blocked connection"
            );
            match self.control.terminate(pid).await {
                Ok(()) => terminated += 1,
                Err(err) => {
                    warn!(pid, error = %err, "could not terminate connection owner");
                }
            }
        }

        let outcome = if terminated > 0 { GuardOutcome::Severed } else { GuardOutcome::Clean };
        info!(terminated, patterns = checked_patterns.len(), "connection guard sweep complete");
        GuardReport { outcome, terminated, checked_patterns }
    }
}
