//! Command handlers: one module per subcommand.
//!
//! Handlers own the console output for their command and delegate all
//! decisions to the orchestrator in [`crate::bootstrap::CliContext`].

pub mod check;
pub mod run;
pub mod serve;
pub mod shutdown;
pub mod status;
