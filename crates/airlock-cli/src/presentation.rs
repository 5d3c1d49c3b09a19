//! Shared CLI presentation utilities.
//!
//! This module provides reusable display and formatting functions for
//! consistent CLI output across commands.
//!
//! # Guidelines
//!
//! - Keep this module format-only: no domain transforms
//! - Anything that decides state belongs in the runtime, not here

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use airlock_runtime::{
    CaseStatus, CheckReport, GuardOutcome, Liveness, RunReport, ServiceStatus, StatusReport,
    Verdict,
};

/// Where `run` and `status` write their JSON report.
pub const STATUS_REPORT_FILE: &str = "airlock_status_report.json";

/// Where `check` writes its JSON report.
pub const CHECK_REPORT_FILE: &str = "airlock_check_report.json";

/// Print a horizontal separator line.
pub fn print_separator(width: usize) {
    println!("{}", "-".repeat(width));
}

/// Format an optional value for table display, returning a default if None.
pub fn format_optional<T: std::fmt::Display>(value: &Option<T>, default: &str) -> String {
    match value {
        Some(v) => v.to_string(),
        None => default.to_string(),
    }
}

/// Write `report` as pretty-printed JSON to `path`.
pub fn write_report<T: Serialize>(path: &Path, report: &T) -> Result<()> {
    let body = serde_json::to_string_pretty(report).context("serializing report")?;
    std::fs::write(path, body).with_context(|| format!("writing {}", path.display()))?;
    tracing::info!(path = %path.display(), "report written");
    println!("📄 Report written to {}", path.display());
    Ok(())
}

/// Print a run report as a phase-by-phase summary.
pub fn print_run_report(report: &RunReport) {
    println!("🚀 Airlock run - {}", report.timestamp);
    print_separator(64);

    if report.port_sweep.killed.is_empty() && report.port_sweep.failures.is_empty() {
        println!("Ports:       already clear");
    } else {
        println!(
            "Ports:       {} process(es) terminated, {} failure(s)",
            report.port_sweep.total_killed(),
            report.port_sweep.failures.len()
        );
    }
    for failure in &report.port_sweep.failures {
        println!("             ⚠️  {failure}");
    }

    println!("Environment: {} variable(s) prepared", report.environment.len());

    println!("Services:    {}/{} running", report.running_count(), report.services.len());
    print_services(&report.services);

    match &report.guard.outcome {
        GuardOutcome::Clean => println!("Guard:       no blocked connections"),
        GuardOutcome::Severed => {
            println!("Guard:       {} connection owner(s) severed", report.guard.terminated);
        }
        GuardOutcome::Failed { error } => println!("Guard:       ❌ {error}"),
    }
    print_separator(64);
}

/// Print a point-in-time status snapshot.
pub fn print_status_report(report: &StatusReport) {
    println!("📊 Airlock status - {}", report.timestamp);
    print_separator(64);
    println!("Launcher:    {}", report.launcher_status);
    println!("Services:    {}/{} running", report.running_services, report.total_services);
    print_services(&report.services);
    print_separator(64);
}

/// Print a check report, one line per case plus the verdict.
pub fn print_check_report(report: &CheckReport) {
    println!("🔍 Airlock readiness checks - {}", report.timestamp);
    print_separator(64);
    for case in &report.cases {
        let icon = match case.status {
            CaseStatus::Passed => "✅",
            CaseStatus::Failed => "❌",
            CaseStatus::Error => "⚠️",
        };
        println!("{icon} {:<28} {:>5} ms  {}", case.name, case.duration_ms, case.detail);
    }
    print_separator(64);
    println!(
        "Verdict: {} ({}/{} passed)",
        verdict_label(report.verdict),
        report.passed_count(),
        report.cases.len()
    );
}

fn print_services(services: &BTreeMap<String, ServiceStatus>) {
    for (name, status) in services {
        println!(
            "  {name:<16} {:<8}  pid {:<8} port {:<6} {}",
            liveness_label(status.status),
            format_optional(&status.pid, "--"),
            format_optional(&status.port, "--"),
            status.error.as_deref().unwrap_or("")
        );
    }
}

fn liveness_label(liveness: Liveness) -> &'static str {
    match liveness {
        Liveness::Starting => "STARTING",
        Liveness::Running => "RUNNING",
        Liveness::Stopped => "STOPPED",
        Liveness::Failed => "FAILED",
    }
}

fn verdict_label(verdict: Verdict) -> &'static str {
    match verdict {
        Verdict::Pass => "PASS",
        Verdict::Partial => "PARTIAL",
        Verdict::Fail => "FAIL",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_optional_uses_value_when_present() {
        assert_eq!(format_optional(&Some(4242_u32), "--"), "4242");
    }

    #[test]
    fn format_optional_falls_back_when_absent() {
        assert_eq!(format_optional(&None::<u16>, "--"), "--");
    }

    #[test]
    fn write_report_produces_parseable_json() {
        #[derive(Serialize)]
        struct Sample {
            ok: bool,
        }

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        write_report(&path, &Sample { ok: true }).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["ok"], serde_json::json!(true));
    }
}
