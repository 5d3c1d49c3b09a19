//! Launching and supervising the environment's services.
//!
//! The supervisor is the only owner of child-process handles. Liveness is
//! never cached: every query re-probes the handle, because a PID that was
//! alive a second ago proves nothing.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use airlock_core::ServiceSpec;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, error, info, warn};

const DEFAULT_SETTLE: Duration = Duration::from_secs(3);
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Observed state of one managed service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Liveness {
    /// Spawned, settle interval not yet over. Only visible while
    /// `start_all` is in flight.
    Starting,
    Running,
    /// Exited on its own with a zero status.
    Stopped,
    /// Never launched, or exited with a non-zero status.
    Failed,
}

/// Reportable status of one service.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceStatus {
    pub status: Liveness,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ServiceStatus {
    fn running(pid: Option<u32>, port: Option<u16>) -> Self {
        Self { status: Liveness::Running, pid, port, error: None }
    }

    fn failed(port: Option<u16>, error: String) -> Self {
        Self { status: Liveness::Failed, pid: None, port, error: Some(error) }
    }
}

/// Everything the supervisor holds for one service.
struct ServiceHandle {
    spec: ServiceSpec,
    child: Option<Child>,
    /// Exit status recorded the first time a probe observes it.
    exit: Option<ExitStatus>,
    last_error: Option<String>,
}

/// Owns and supervises the environment's child processes.
pub struct ServiceSupervisor {
    services: HashMap<String, ServiceHandle>,
    environment: BTreeMap<String, String>,
    settle: Duration,
    shutdown_timeout: Duration,
}

impl ServiceSupervisor {
    /// `environment` is injected into every launched child.
    #[must_use]
    pub fn new(environment: BTreeMap<String, String>) -> Self {
        Self {
            services: HashMap::new(),
            environment,
            settle: DEFAULT_SETTLE,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_settle_interval(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    #[must_use]
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// The environment every child is launched with.
    #[must_use]
    pub const fn environment(&self) -> &BTreeMap<String, String> {
        &self.environment
    }

    /// Names of all services the supervisor has been asked to start.
    #[must_use]
    pub fn service_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.services.keys().cloned().collect();
        names.sort();
        names
    }

    /// Start every service in order.
    ///
    /// One service failing to launch never blocks the rest: the failure
    /// is recorded in its status and the sequence continues.
    pub async fn start_all(
        &mut self,
        specs: &[ServiceSpec],
    ) -> BTreeMap<String, ServiceStatus> {
        let mut statuses = BTreeMap::new();
        for spec in specs {
            let status = self.start_service(spec).await;
            statuses.insert(spec.name.clone(), status);
        }
        statuses
    }

    async fn start_service(&mut self, spec: &ServiceSpec) -> ServiceStatus {
        info!(service = %spec.name, command = %spec.command, "starting service");

        let target = match resolve_launch_target(&spec.command) {
            Ok(target) => target,
            Err(reason) => {
                error!(service = %spec.name, %reason, "launch target missing");
                self.record_failure(spec, reason.clone());
                return ServiceStatus::failed(spec.port, reason);
            }
        };

        let mut command = Command::new(&target);
        command
            .args(&spec.args)
            .envs(&self.environment)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(err) => {
                let reason = format!("spawn failed: {err}");
                error!(service = %spec.name, %reason, "could not start service");
                self.record_failure(spec, reason.clone());
                return ServiceStatus::failed(spec.port, reason);
            }
        };

        // Give the process its settle window, then probe exactly once.
        tokio::time::sleep(self.settle).await;

        match child.try_wait() {
            Ok(None) => {
                let pid = child.id();
                forward_service_logs(&spec.name, &mut child);
                info!(service = %spec.name, pid, "service running");
                self.services.insert(
                    spec.name.clone(),
                    ServiceHandle {
                        spec: spec.clone(),
                        child: Some(child),
                        exit: None,
                        last_error: None,
                    },
                );
                ServiceStatus::running(pid, spec.port)
            }
            Ok(Some(exit)) => {
                let reason = capture_startup_failure(child, exit).await;
                error!(service = %spec.name, %reason, "service exited during startup");
                self.services.insert(
                    spec.name.clone(),
                    ServiceHandle {
                        spec: spec.clone(),
                        child: None,
                        exit: Some(exit),
                        last_error: Some(reason.clone()),
                    },
                );
                ServiceStatus::failed(spec.port, reason)
            }
            Err(err) => {
                let reason = format!("startup probe failed: {err}");
                error!(service = %spec.name, %reason, "cannot probe service");
                self.record_failure(spec, reason.clone());
                ServiceStatus::failed(spec.port, reason)
            }
        }
    }

    /// Re-probe one service's liveness. Unknown names are `Failed`.
    pub fn health_of(&mut self, name: &str) -> Liveness {
        let Some(handle) = self.services.get_mut(name) else {
            return Liveness::Failed;
        };

        if let Some(exit) = handle.exit {
            return liveness_from_exit(exit);
        }

        let Some(child) = handle.child.as_mut() else {
            // Never launched.
            return Liveness::Failed;
        };

        match child.try_wait() {
            Ok(None) => Liveness::Running,
            Ok(Some(exit)) => {
                debug!(service = %name, status = %exit, "service exited");
                handle.exit = Some(exit);
                handle.child = None;
                liveness_from_exit(exit)
            }
            Err(err) => {
                warn!(service = %name, error = %err, "liveness probe failed");
                Liveness::Failed
            }
        }
    }

    /// Current status of every known service, re-probed.
    pub fn statuses(&mut self) -> BTreeMap<String, ServiceStatus> {
        let names = self.service_names();
        let mut statuses = BTreeMap::new();
        for name in names {
            let status = self.health_of(&name);
            let handle = &self.services[&name];
            statuses.insert(
                name.clone(),
                ServiceStatus {
                    status,
                    pid: handle.child.as_ref().and_then(Child::id),
                    port: handle.spec.port,
                    error: handle.last_error.clone(),
                },
            );
        }
        statuses
    }

    /// Stop every service: polite signal first, forced kill after the
    /// shutdown timeout. The handle table is always cleared, even when a
    /// stop fails, so a repeated shutdown is a successful no-op.
    pub async fn shutdown_all(&mut self) -> bool {
        let mut success = true;
        for (name, mut handle) in self.services.drain() {
            let Some(child) = handle.child.take() else {
                continue;
            };
            info!(service = %name, "stopping service");
            match shutdown_child(child, self.shutdown_timeout).await {
                Ok(exit) => debug!(service = %name, status = %exit, "service stopped"),
                Err(err) => {
                    error!(service = %name, error = %err, "failed to stop service");
                    success = false;
                }
            }
        }
        success
    }
}

fn liveness_from_exit(exit: ExitStatus) -> Liveness {
    if exit.success() { Liveness::Stopped } else { Liveness::Failed }
}

impl ServiceSupervisor {
    fn record_failure(&mut self, spec: &ServiceSpec, reason: String) {
        self.services.insert(
            spec.name.clone(),
            ServiceHandle {
                spec: spec.clone(),
                child: None,
                exit: None,
                last_error: Some(reason),
            },
        );
    }
}

/// Resolve a launch target: bare names go through `PATH`, anything with a
/// path separator must exist as given.
fn resolve_launch_target(command: &str) -> Result<PathBuf, String> {
    let path = Path::new(command);
    if path.is_absolute() || command.contains(std::path::MAIN_SEPARATOR) {
        if path.exists() {
            Ok(path.to_path_buf())
        } else {
            Err(format!("launch target not found: {command}"))
        }
    } else {
        which::which(command)
            .map_err(|_| format!("launch target not found on PATH: {command}"))
    }
}

/// A service died inside its settle window: collect its stderr for the
/// failure report.
async fn capture_startup_failure(child: Child, exit: ExitStatus) -> String {
    match child.wait_with_output().await {
        Ok(output) => {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr = stderr.trim();
            if stderr.is_empty() {
                format!("exited during startup ({exit})")
            } else {
                format!("exited during startup ({exit}): {stderr}")
            }
        }
        Err(err) => format!("exited during startup ({exit}); stderr unavailable: {err}"),
    }
}

/// Drain a running child's pipes into tracing so they never fill up.
fn forward_service_logs(name: &str, child: &mut Child) {
    if let Some(stdout) = child.stdout.take() {
        let service = name.to_string();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(service = %service, "{line}");
            }
        });
    }
    if let Some(stderr) = child.stderr.take() {
        let service = name.to_string();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(service = %service, stream = "stderr", "{line}");
            }
        });
    }
}

/// Polite stop for an owned child: SIGTERM, bounded wait, then kill.
async fn shutdown_child(mut child: Child, timeout: Duration) -> std::io::Result<ExitStatus> {
    #[cfg(unix)]
    {
        use nix::sys::signal::{self, Signal};
        use nix::unistd::Pid;

        if let Some(pid) = child.id() {
            match signal::kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
                // ESRCH means it already exited; wait() below reaps it.
                Ok(()) | Err(nix::errno::Errno::ESRCH) => {}
                Err(err) => warn!(pid, error = %err, "SIGTERM delivery failed"),
            }
            match tokio::time::timeout(timeout, child.wait()).await {
                Ok(result) => return result,
                Err(_) => warn!(pid, "graceful stop timed out, killing"),
            }
        }
        child.kill().await?;
        child.wait().await
    }

    #[cfg(not(unix))]
    {
        let _ = timeout;
        child.kill().await?;
        child.wait().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(name: &str, command: &str, args: &[&str]) -> ServiceSpec {
        ServiceSpec {
            name: name.to_string(),
            command: command.to_string(),
            args: args.iter().map(ToString::to_string).collect(),
            port: None,
        }
    }

    fn quick_supervisor() -> ServiceSupervisor {
        ServiceSupervisor::new(BTreeMap::new())
            .with_settle_interval(Duration::from_millis(80))
            .with_shutdown_timeout(Duration::from_secs(2))
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn missing_target_fails_without_blocking_others() {
        let mut supervisor = quick_supervisor();
        let specs = vec![
            spec("ghost", "definitely-not-a-real-binary-xyz", &[]),
            spec("sleeper", "sleep", &["5"]),
        ];

        let statuses = supervisor.start_all(&specs).await;

        assert_eq!(statuses["ghost"].status, Liveness::Failed);
        assert!(statuses["ghost"].error.as_ref().unwrap().contains("not found"));
        // The second service still started.
        assert_eq!(statuses["sleeper"].status, Liveness::Running);
        assert!(statuses["sleeper"].pid.is_some());

        assert!(supervisor.shutdown_all().await);
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn early_exit_captures_stderr() {
        let mut supervisor = quick_supervisor();
        let specs = vec![spec("broken", "sh", &["-c", "echo boom >&2; exit 3"])];

        let statuses = supervisor.start_all(&specs).await;

        assert_eq!(statuses["broken"].status, Liveness::Failed);
        let error = statuses["broken"].error.as_ref().unwrap();
        assert!(error.contains("boom"), "stderr missing from {error}");
        assert_eq!(supervisor.health_of("broken"), Liveness::Failed);
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn health_distinguishes_clean_exit_from_crash() {
        let mut supervisor = quick_supervisor();
        let specs = vec![
            spec("clean", "sh", &["-c", "sleep 0.3"]),
            spec("crash", "sh", &["-c", "sleep 0.3; exit 7"]),
        ];

        let statuses = supervisor.start_all(&specs).await;
        assert_eq!(statuses["clean"].status, Liveness::Running);
        assert_eq!(statuses["crash"].status, Liveness::Running);

        // Let both exit, then re-probe.
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(supervisor.health_of("clean"), Liveness::Stopped);
        assert_eq!(supervisor.health_of("crash"), Liveness::Failed);
        // Probing again returns the recorded exit, not Failed-by-absence.
        assert_eq!(supervisor.health_of("clean"), Liveness::Stopped);
    }

    #[tokio::test]
    async fn unknown_service_is_failed() {
        let mut supervisor = quick_supervisor();
        assert_eq!(supervisor.health_of("nobody"), Liveness::Failed);
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn shutdown_stops_running_services_and_clears_table() {
        let mut supervisor = quick_supervisor();
        let statuses = supervisor.start_all(&[spec("sleeper", "sleep", &["30"])]).await;
        assert_eq!(statuses["sleeper"].status, Liveness::Running);

        assert!(supervisor.shutdown_all().await);
        assert!(supervisor.service_names().is_empty());
        // Idempotent: nothing left to stop is still a success.
        assert!(supervisor.shutdown_all().await);
    }

    #[tokio::test]
    async fn shutdown_of_empty_supervisor_succeeds() {
        let mut supervisor = quick_supervisor();
        assert!(supervisor.shutdown_all().await);
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn children_receive_the_configured_environment() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("env-marker");
        let mut supervisor = ServiceSupervisor::new(BTreeMap::from([(
            "AIRLOCK_TEST_VALUE".to_string(),
            "sealed".to_string(),
        )]))
        .with_settle_interval(Duration::from_millis(200))
        .with_shutdown_timeout(Duration::from_secs(2));

        let script = format!("printf %s \"$AIRLOCK_TEST_VALUE\" > {}", marker.display());
        let statuses = supervisor.start_all(&[spec("env-probe", "sh", &["-c", &script])]).await;
        // The probe exits within the settle window by design; the file is
        // what we are after.
        assert_eq!(statuses["env-probe"].status, Liveness::Failed);
        assert_eq!(std::fs::read_to_string(&marker).unwrap(), "sealed");
    }

    #[test]
    fn liveness_serializes_screaming() {
        assert_eq!(serde_json::to_string(&Liveness::Running).unwrap(), "\"RUNNING\"");
        assert_eq!(serde_json::to_string(&Liveness::Failed).unwrap(), "\"FAILED\"");
    }

    #[test]
    fn resolve_rejects_missing_path_target() {
        let err = resolve_launch_target("/definitely/not/here").unwrap_err();
        assert!(err.contains("not found"));
    }

    #[cfg(unix)]
    #[test]
    fn resolve_finds_sh_on_path() {
        assert!(resolve_launch_target("sh").is_ok());
    }
}
