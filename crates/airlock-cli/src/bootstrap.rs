//! CLI bootstrap - the composition root.
//!
//! This module is the ONLY place where infrastructure is wired together
//! for the CLI adapter. All concrete implementations are instantiated here:
//! - `/proc` socket-table probe (via airlock-runtime)
//! - Signal-based process control (via airlock-runtime)
//! - The orchestrator that drives both (via airlock-runtime)
//!
//! Command handlers receive the fully-composed context and delegate to it.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;

use airlock_core::EnvironmentConfig;
use airlock_runtime::{Orchestrator, ProcfsNetProbe, SignalProcessControl};

/// Fully composed application context for CLI commands.
pub struct CliContext {
    /// Orchestrator wired with the real OS adapters.
    pub orchestrator: Orchestrator,
}

impl CliContext {
    /// Access the loaded configuration.
    #[must_use]
    pub fn config(&self) -> &EnvironmentConfig {
        self.orchestrator.config()
    }
}

/// Load the configuration from `config_path` (built-in defaults when the
/// file does not exist) and assemble the orchestrator.
pub fn bootstrap(config_path: &Path) -> Result<CliContext> {
    let config = EnvironmentConfig::load(config_path)?;
    let orchestrator = Orchestrator::new(
        config,
        Arc::new(ProcfsNetProbe::new()),
        Arc::new(SignalProcessControl::new()),
    );
    Ok(CliContext { orchestrator })
}
