//! Host-side runtime for the sealed environment: frees the ports the
//! stack needs, launches and supervises the local services, severs any
//! lingering connections to blocked endpoints, and reports on all of it.
//!
//! Everything that touches the OS goes through the capability traits in
//! `airlock-core`, so the whole runtime can be driven against synthetic
//! socket and process tables in tests.

#![deny(unsafe_code)]

pub mod control;
pub mod diagnostics;
pub mod guard;
pub mod netstat;
pub mod orchestrator;
pub mod reaper;
pub mod report;
pub mod supervisor;

#[cfg(test)]
pub(crate) mod test_support;

pub use control::SignalProcessControl;
pub use diagnostics::{CaseStatus, CheckCase, CheckReport, Verdict, run_checks};
pub use guard::{ConnectionGuard, GuardOutcome, GuardReport};
pub use netstat::ProcfsNetProbe;
pub use orchestrator::Orchestrator;
pub use reaper::{PortReaper, PortSweep};
pub use report::{RunReport, StatusReport};
pub use supervisor::{Liveness, ServiceStatus, ServiceSupervisor};
