//! Readiness checks: does the sealed environment actually behave?
//!
//! Each check exercises a real subsystem through the orchestrator; cases
//! are individually toggleable so a degraded host (say, no procfs) can
//! still run the rest of the suite.

use airlock_core::util::human_timestamp;
use serde::Serialize;
use tokio::time::Instant;
use tracing::info;

use crate::orchestrator::Orchestrator;
use crate::supervisor::Liveness;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CaseStatus {
    Passed,
    /// Evaluated and found wanting.
    Failed,
    /// Could not be evaluated (for instance, the socket tables were
    /// unreadable).
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckCase {
    pub name: &'static str,
    pub status: CaseStatus,
    pub duration_ms: u64,
    pub detail: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Verdict {
    Pass,
    Partial,
    Fail,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    pub timestamp: String,
    pub cases: Vec<CheckCase>,
    pub verdict: Verdict,
}

impl CheckReport {
    #[must_use]
    pub fn passed_count(&self) -> usize {
        self.cases.iter().filter(|case| case.status == CaseStatus::Passed).count()
    }
}

/// Run every enabled check against `orchestrator`.
///
/// The startup-fluency case performs a full run, so services may be left
/// running afterwards; callers own the subsequent shutdown.
pub async fn run_checks(orchestrator: &mut Orchestrator) -> CheckReport {
    let toggles = orchestrator.config().checks;
    let mut cases = Vec::new();

    if toggles.startup_fluency {
        cases.push(timed("local_startup_fluency", startup_fluency(orchestrator)).await);
    }
    if toggles.port_conflicts {
        cases.push(timed("port_conflict_resolution", port_conflicts(orchestrator)).await);
    }
    if toggles.environment_access {
        cases.push(environment_access(orchestrator));
    }
    if toggles.service_probes {
        cases.push(service_probes(orchestrator));
    }
    if toggles.offline_guard {
        cases.push(timed("offline_guard", offline_guard(orchestrator)).await);
    }

    let verdict = verdict_for(&cases);
    for case in &cases {
        info!(case = case.name, status = ?case.status, detail = %case.detail, "check case");
    }
    CheckReport { timestamp: human_timestamp(), cases, verdict }
}

fn verdict_for(cases: &[CheckCase]) -> Verdict {
    let passed = cases.iter().filter(|case| case.status == CaseStatus::Passed).count();
    if passed == cases.len() {
        Verdict::Pass
    } else if passed > 0 {
        Verdict::Partial
    } else {
        Verdict::Fail
    }
}

async fn timed(
    name: &'static str,
    future: impl Future<Output = (CaseStatus, String)>,
) -> CheckCase {
    let started = Instant::now();
    let (status, detail) = future.await;
    CheckCase {
        name,
        status,
        duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        detail,
    }
}

/// A full run completes and every configured service comes up.
async fn startup_fluency(orchestrator: &mut Orchestrator) -> (CaseStatus, String) {
    let report = orchestrator.run().await;
    let running = report.running_count();
    let total = report.services.len();
    let detail = format!("{running}/{total} services running");
    if running == total { (CaseStatus::Passed, detail) } else { (CaseStatus::Failed, detail) }
}

/// Reaping the target ports twice: the second pass must find nothing.
async fn port_conflicts(orchestrator: &Orchestrator) -> (CaseStatus, String) {
    let first = orchestrator.reap_ports().await;
    if !first.failures.is_empty() {
        return (CaseStatus::Error, first.failures.join("; "));
    }
    let second = orchestrator.reap_ports().await;
    if second.is_clean() {
        (CaseStatus::Passed, format!("first pass cleared {}", first.total_killed()))
    } else {
        (CaseStatus::Failed, format!("second pass still killed {}", second.total_killed()))
    }
}

/// Every configured variable reaches the child environment unchanged.
fn environment_access(orchestrator: &Orchestrator) -> CheckCase {
    let started = Instant::now();
    let configured = orchestrator.config().environment.clone();
    let prepared = orchestrator.prepared_environment();
    let missing: Vec<&String> = configured
        .iter()
        .filter(|(key, value)| prepared.get(key.as_str()) != Some(*value))
        .map(|(key, _)| key)
        .collect();
    let (status, detail) = if missing.is_empty() {
        (CaseStatus::Passed, format!("{} variables staged", configured.len()))
    } else {
        (CaseStatus::Failed, format!("missing or altered: {missing:?}"))
    };
    CheckCase {
        name: "environment_access",
        status,
        duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        detail,
    }
}

/// Every known service re-probes as running.
fn service_probes(orchestrator: &mut Orchestrator) -> CheckCase {
    let started = Instant::now();
    let names = orchestrator.service_names();
    let stalled: Vec<String> = names
        .iter()
        .filter(|name| orchestrator.probe_service(name) != Liveness::Running)
        .cloned()
        .collect();
    let (status, detail) = if names.is_empty() {
        (CaseStatus::Passed, "no services configured".to_string())
    } else if stalled.is_empty() {
        (CaseStatus::Passed, format!("{} services running", names.len()))
    } else {
        (CaseStatus::Failed, format!("not running: {}", stalled.join(", ")))
    };
    CheckCase {
        name: "service_probes",
        status,
        duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        detail,
    }
}

/// The guard can sweep, whatever it finds.
async fn offline_guard(orchestrator: &Orchestrator) -> (CaseStatus, String) {
    let report = orchestrator.guard_sweep().await;
    if report.outcome.is_failed() {
        (CaseStatus::Error, "connection table unavailable".to_string())
    } else {
        (
            CaseStatus::Passed,
            format!(
                "{} patterns checked, {} connections severed",
                report.checked_patterns.len(),
                report.terminated
            ),
        )
    }
}
