//! CLI module for provsync
//!
//! Provides command-line interface for:
//! - start: Boot the POD and serve until interrupted
//! - check-config: Validate a configuration file
//! - role: One-shot role detection

mod args;
mod commands;
mod errors;

pub use args::{Cli, Command};
pub use commands::{check_config, role, run_command, start};
pub use errors::{CliError, CliErrorCode, CliResult};

/// Parse arguments and run the selected command.
pub fn run() -> CliResult<()> {
    run_command(Cli::parse_args().command)
}
