//! Run command handler.
//!
//! Performs the full orchestration pass, reports on it, then holds the
//! services until Ctrl-C.

use std::path::Path;

use anyhow::Result;

use crate::bootstrap::CliContext;
use crate::presentation::{self, STATUS_REPORT_FILE};

/// Execute the run command.
///
/// Frees the target ports, prepares the service environment, starts every
/// configured service, severs connections matching the block patterns, and
/// writes the run report. The process then waits for Ctrl-C and shuts every
/// service down before returning.
///
/// # Errors
///
/// Returns an error if the report cannot be written or the Ctrl-C signal
/// handler cannot be installed. Degraded phases (unkillable listeners,
/// failed services, an unreadable connection table) are recorded in the
/// report rather than treated as fatal.
pub async fn execute(ctx: &mut CliContext) -> Result<()> {
    let report = ctx.orchestrator.run().await;

    presentation::print_run_report(&report);
    presentation::write_report(Path::new(STATUS_REPORT_FILE), &report)?;

    if report.is_degraded() {
        println!("⚠️  Some phases reported problems; see the report for details.");
    }
    println!();
    println!("Environment sealed. Press Ctrl+C to shut down.");

    tokio::signal::ctrl_c().await?;
    println!();
    tracing::info!("shutdown requested");

    if ctx.orchestrator.shutdown().await {
        println!("✅ All services stopped.");
    } else {
        println!("⚠️  Shutdown finished with warnings; see the log.");
    }
    Ok(())
}
