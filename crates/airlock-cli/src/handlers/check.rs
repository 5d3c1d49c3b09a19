//! Check command handler.
//!
//! Runs the readiness checks, reports, and cleans up after itself.

use std::path::Path;

use anyhow::Result;

use airlock_runtime::{Verdict, run_checks};

use crate::bootstrap::CliContext;
use crate::presentation::{self, CHECK_REPORT_FILE};

/// Execute the check command and return the overall verdict.
///
/// The startup-fluency case performs a real orchestration run, so this
/// always finishes with a shutdown pass regardless of the verdict. The
/// caller decides the exit code.
///
/// # Errors
///
/// Returns an error if the report file cannot be written.
pub async fn execute(ctx: &mut CliContext) -> Result<Verdict> {
    let report = run_checks(&mut ctx.orchestrator).await;

    presentation::print_check_report(&report);
    presentation::write_report(Path::new(CHECK_REPORT_FILE), &report)?;

    if !ctx.orchestrator.shutdown().await {
        tracing::warn!("post-check shutdown left stragglers");
    }
    Ok(report.verdict)
}
