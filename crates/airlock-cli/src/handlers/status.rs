//! Status command handler.
//!
//! Snapshots the liveness of every configured service without starting
//! anything.

use std::path::Path;

use anyhow::Result;

use crate::bootstrap::CliContext;
use crate::presentation::{self, STATUS_REPORT_FILE};

/// Execute the status command: probe, print, and write the snapshot.
///
/// The supervisor only vouches for its own children, so a fresh
/// invocation that launched nothing reports zero services.
///
/// # Errors
///
/// Returns an error if the report file cannot be written.
pub fn execute(ctx: &mut CliContext) -> Result<()> {
    let report = ctx.orchestrator.status_report();
    presentation::print_status_report(&report);
    presentation::write_report(Path::new(STATUS_REPORT_FILE), &report)
}
