//! The startup sequence that seals an environment.
//!
//! Phases run in a strict order because each one depends on the previous
//! one's side effects being visible: ports must be free before services
//! bind them, the environment must be prepared before children inherit
//! it, and the guard only sweeps once everything that should be running
//! is up. Every phase is best-effort; a partial failure is recorded in
//! the report, not thrown.

use std::sync::Arc;

use airlock_core::EnvironmentConfig;
use airlock_core::ports::{NetProbe, ProcessControl};
use airlock_core::util::human_timestamp;
use tracing::{debug, info};

use crate::guard::{ConnectionGuard, GuardReport};
use crate::reaper::{PortReaper, PortSweep};
use crate::report::{RunReport, StatusReport};
use crate::supervisor::{Liveness, ServiceSupervisor};

/// Owns the subsystems and drives the phase sequence.
pub struct Orchestrator {
    config: EnvironmentConfig,
    reaper: PortReaper,
    guard: ConnectionGuard,
    supervisor: ServiceSupervisor,
}

impl Orchestrator {
    #[must_use]
    pub fn new(
        config: EnvironmentConfig,
        probe: Arc<dyn NetProbe>,
        control: Arc<dyn ProcessControl>,
    ) -> Self {
        let reaper =
            PortReaper::new(probe.clone(), control.clone()).with_grace(config.reap_grace());
        let guard = ConnectionGuard::new(probe, control);
        let supervisor = ServiceSupervisor::new(config.environment.clone())
            .with_settle_interval(config.settle_interval())
            .with_shutdown_timeout(config.shutdown_timeout());
        Self { config, reaper, guard, supervisor }
    }

    #[must_use]
    pub const fn config(&self) -> &EnvironmentConfig {
        &self.config
    }

    /// Run the full sequence: reap ports, prepare the environment, start
    /// services, sweep connections, assemble the report.
    pub async fn run(&mut self) -> RunReport {
        info!(
            services = self.config.services.len(),
            ports = self.config.target_ports.len(),
            "sealing local environment"
        );

        let port_sweep = if self.config.cleanup_on_startup {
            self.reaper.reap(&self.config.target_ports).await
        } else {
            debug!("startup cleanup disabled, skipping port sweep");
            PortSweep::default()
        };

        let environment = self.prepare_environment();

        let services = self.supervisor.start_all(&self.config.services).await;

        let guard = self.guard.sweep(&self.config.blocked_domains).await;

        let report =
            RunReport { timestamp: human_timestamp(), port_sweep, environment, services, guard };
        info!(
            running = report.running_count(),
            total = report.services.len(),
            severed = report.guard.terminated,
            "environment sealed"
        );
        report
    }

    /// The environment phase: every configured variable is staged for the
    /// services that follow. Children receive them at spawn, so by the
    /// time the startup phase runs the variables are already in force.
    fn prepare_environment(&self) -> Vec<String> {
        for key in self.config.environment.keys() {
            debug!(variable = %key, "environment variable prepared for services");
        }
        self.config.environment.keys().cloned().collect()
    }

    /// Re-reap the configured target ports outside a full run.
    pub async fn reap_ports(&self) -> PortSweep {
        self.reaper.reap(&self.config.target_ports).await
    }

    /// One guard sweep outside a full run.
    pub async fn guard_sweep(&self) -> GuardReport {
        self.guard.sweep(&self.config.blocked_domains).await
    }

    /// Re-probe a single service.
    pub fn probe_service(&mut self, name: &str) -> Liveness {
        self.supervisor.health_of(name)
    }

    /// The variable map services are launched with.
    #[must_use]
    pub const fn prepared_environment(&self) -> &std::collections::BTreeMap<String, String> {
        self.supervisor.environment()
    }

    /// Names of every service the supervisor knows about.
    #[must_use]
    pub fn service_names(&self) -> Vec<String> {
        self.supervisor.service_names()
    }

    /// Snapshot the current liveness of every service.
    pub fn status_report(&mut self) -> StatusReport {
        StatusReport::new(human_timestamp(), self.supervisor.statuses())
    }

    /// Stop everything. Idempotent; `false` when any stop step errored.
    pub async fn shutdown(&mut self) -> bool {
        info!("shutting down managed services");
        self.supervisor.shutdown_all().await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use airlock_core::{BlockPattern, ServiceSpec};

    use super::*;
    use crate::guard::GuardOutcome;
    use crate::test_support::SyntheticHost;

    fn fast_config() -> EnvironmentConfig {
        EnvironmentConfig {
            target_ports: vec![8080],
            services: Vec::new(),
            environment: BTreeMap::from([("KEY".to_string(), "value".to_string())]),
            blocked_domains: vec![BlockPattern::from("8.212.*")],
            reap_grace_secs: 0,
            settle_secs: 0,
            ..EnvironmentConfig::default()
        }
    }

    #[tokio::test]
    async fn run_sequences_all_phases_into_the_report() {
        let host = Arc::new(
            SyntheticHost::new()
                .listener(8080, Some(100))
                .connection(50000, "8.212.3.4:443", Some(200)),
        );
        let mut orchestrator =
            Orchestrator::new(fast_config(), host.clone(), host.clone());

        let report = orchestrator.run().await;

        // Phase 1 freed the port, phase 4 severed the connection.
        assert_eq!(report.port_sweep.killed.get(&8080).unwrap(), &vec![100]);
        assert_eq!(report.guard.terminated, 1);
        assert_eq!(report.environment, vec!["KEY".to_string()]);
        assert!(report.services.is_empty());
        assert!(!report.is_degraded());
        // Reap before guard: the listener died first.
        assert_eq!(host.terminated(), vec![100, 200]);
    }

    #[tokio::test]
    async fn cleanup_can_be_disabled() {
        let host = Arc::new(SyntheticHost::new().listener(8080, Some(100)));
        let config = EnvironmentConfig { cleanup_on_startup: false, ..fast_config() };
        let mut orchestrator = Orchestrator::new(config, host.clone(), host.clone());

        let report = orchestrator.run().await;

        assert!(report.port_sweep.killed.is_empty());
        assert!(host.terminated().is_empty());
    }

    #[tokio::test]
    async fn degraded_enumeration_still_produces_a_report() {
        let host = Arc::new(SyntheticHost::unreadable());
        let mut orchestrator =
            Orchestrator::new(fast_config(), host.clone(), host.clone());

        let report = orchestrator.run().await;

        assert!(!report.port_sweep.failures.is_empty());
        assert_eq!(report.guard.outcome, GuardOutcome::Failed {
            error: "connection table unavailable: synthetic table failure".to_string()
        });
        assert!(report.is_degraded());
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn status_report_reflects_live_services() {
        let host = Arc::new(SyntheticHost::new());
        let config = EnvironmentConfig {
            services: vec![ServiceSpec {
                name: "sleeper".to_string(),
                command: "sleep".to_string(),
                args: vec!["5".to_string()],
                port: Some(4242),
            }],
            shutdown_timeout_secs: 2,
            ..fast_config()
        };
        let mut orchestrator = Orchestrator::new(config, host.clone(), host);

        let run = orchestrator.run().await;
        assert_eq!(run.running_count(), 1);

        let status = orchestrator.status_report();
        assert_eq!(status.total_services, 1);
        assert_eq!(status.running_services, 1);
        assert_eq!(status.services["sleeper"].port, Some(4242));

        assert!(orchestrator.shutdown().await);
        let status = orchestrator.status_report();
        assert_eq!(status.total_services, 0);
    }

    #[tokio::test]
    async fn shutdown_with_nothing_running_succeeds() {
        let host = Arc::new(SyntheticHost::new());
        let mut orchestrator =
            Orchestrator::new(fast_config(), host.clone(), host);
        assert!(orchestrator.shutdown().await);
        assert!(orchestrator.shutdown().await);
    }
}
