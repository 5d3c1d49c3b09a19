//! Main commands enum and primary subcommands.
//!
//! This module defines the available commands for the CLI tool.

use clap::Subcommand;

/// Available commands for the sealed-environment launcher.
///
/// Each command is a full pass over the configured environment; none of
/// them assume another command ran first.
#[derive(Subcommand)]
pub enum Commands {
    /// Free the target ports, start the services, sever blocked
    /// connections, then hold until Ctrl-C
    Run,

    /// Probe the configured services and write a status report
    Status,

    /// Run the readiness checks and write a check report
    Check,

    /// Stop every supervised service (succeeds when nothing is running)
    Shutdown,

    /// Run the local proxy in the foreground
    Serve {
        /// Port to bind on 127.0.0.1 (defaults to the configured proxy port)
        #[arg(short, long)]
        port: Option<u16>,
    },
}
