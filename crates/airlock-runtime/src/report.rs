//! Serializable run and status reports.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::guard::GuardReport;
use crate::reaper::PortSweep;
use crate::supervisor::{Liveness, ServiceStatus};

/// Everything one orchestration run did, phase by phase.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub timestamp: String,
    pub port_sweep: PortSweep,
    /// Names of the variables prepared for every launched service.
    pub environment: Vec<String>,
    pub services: BTreeMap<String, ServiceStatus>,
    pub guard: GuardReport,
}

impl RunReport {
    /// Services that came up.
    #[must_use]
    pub fn running_count(&self) -> usize {
        self.services
            .values()
            .filter(|status| status.status == Liveness::Running)
            .count()
    }

    /// True when any phase recorded a problem worth surfacing.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        !self.port_sweep.failures.is_empty()
            || self.guard.outcome.is_failed()
            || self
                .services
                .values()
                .any(|status| status.status == Liveness::Failed)
    }
}

/// Point-in-time liveness snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub timestamp: String,
    pub launcher_status: &'static str,
    pub services: BTreeMap<String, ServiceStatus>,
    pub total_services: usize,
    pub running_services: usize,
}

impl StatusReport {
    #[must_use]
    pub fn new(timestamp: String, services: BTreeMap<String, ServiceStatus>) -> Self {
        let total_services = services.len();
        let running_services = services
            .values()
            .filter(|status| status.status == Liveness::Running)
            .count();
        Self {
            timestamp,
            launcher_status: "OPERATIONAL",
            services,
            total_services,
            running_services,
        }
    }
}
