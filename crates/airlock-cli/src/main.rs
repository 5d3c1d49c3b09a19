//! CLI entry point - the composition root.
//!
//! `main` wires logging and configuration, builds the orchestrator via
//! [`airlock_cli::bootstrap`], and dispatches to one handler per
//! subcommand.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use airlock_cli::{Cli, Commands, bootstrap, handlers};
use airlock_runtime::Verdict;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables before anything reads them
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // A RUST_LOG value always wins; --verbose only raises the default.
    let default_directive = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive)),
        )
        .init();

    let Some(command) = cli.command else {
        // No command provided - show help
        use clap::CommandFactory;
        Cli::command().print_help()?;
        return Ok(());
    };

    let mut ctx = bootstrap(&cli.config)?;

    match command {
        Commands::Run => {
            handlers::run::execute(&mut ctx).await?;
        }
        Commands::Status => {
            handlers::status::execute(&mut ctx)?;
        }
        Commands::Check => {
            let verdict = handlers::check::execute(&mut ctx).await?;
            if verdict == Verdict::Fail {
                std::process::exit(1);
            }
        }
        Commands::Shutdown => {
            handlers::shutdown::execute(&mut ctx).await?;
        }
        Commands::Serve { port } => {
            handlers::serve::execute(&ctx, port).await?;
        }
    }

    Ok(())
}
