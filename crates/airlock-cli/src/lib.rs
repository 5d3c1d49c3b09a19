//! Command-line interface for the sealed local AI environment.
//!
//! The binary is a thin dispatcher: `main.rs` parses arguments, builds
//! the composition root in [`bootstrap`], and hands off to one handler
//! per subcommand.

#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

// Used by main.rs only.
use dotenvy as _;
use tracing_subscriber as _;

pub mod bootstrap;
pub mod commands;
pub mod handlers;
pub mod parser;
pub mod presentation;

// Re-export primary types for convenient access
pub use bootstrap::{CliContext, bootstrap};
pub use commands::Commands;
pub use parser::Cli;
