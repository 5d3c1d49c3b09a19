//! Main CLI parser and top-level argument handling.
//!
//! This module defines the root CLI structure with global options.

use std::path::PathBuf;

use clap::Parser;

use crate::commands::Commands;

/// Command-line interface definition for the sealed-environment launcher.
///
/// This is the top-level parser that handles global options and dispatches
/// to subcommands.
#[derive(Parser)]
#[command(name = "airlock")]
#[command(about = "Seal and supervise a local-only AI development environment")]
#[command(version)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(long = "config", global = true, default_value = "airlock.json")]
    pub config: PathBuf,

    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parser_builds() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_args() {
        let cli = Cli::parse_from(["airlock", "--verbose", "--config", "/tmp/airlock.json", "status"]);
        assert!(cli.verbose);
        assert_eq!(cli.config, PathBuf::from("/tmp/airlock.json"));
    }

    #[test]
    fn test_config_defaults_to_local_file() {
        let cli = Cli::parse_from(["airlock", "run"]);
        assert!(!cli.verbose);
        assert_eq!(cli.config, PathBuf::from("airlock.json"));
    }

    #[test]
    fn test_serve_port_override() {
        let cli = Cli::parse_from(["airlock", "serve", "--port", "9090"]);
        match cli.command {
            Some(Commands::Serve { port }) => assert_eq!(port, Some(9090)),
            _ => panic!("expected serve command"),
        }
    }
}
