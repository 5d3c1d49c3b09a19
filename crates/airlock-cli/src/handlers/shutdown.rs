//! Shutdown command handler.

use anyhow::Result;

use crate::bootstrap::CliContext;

/// Execute the shutdown command. Idempotent: succeeds when nothing is
/// running.
pub async fn execute(ctx: &mut CliContext) -> Result<()> {
    println!("Shutting down all services...");
    if ctx.orchestrator.shutdown().await {
        println!("✅ Shutdown complete.");
    } else {
        println!("⚠️  Shutdown finished with warnings; see the log.");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;
    use crate::bootstrap::bootstrap;

    #[test]
    fn shutdown_with_nothing_running_is_clean() {
        let mut ctx = bootstrap(Path::new("/nonexistent/airlock.json")).unwrap();
        tokio_test::block_on(execute(&mut ctx)).unwrap();
    }
}
