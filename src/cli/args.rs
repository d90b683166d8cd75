//! CLI argument definitions using clap
//!
//! Commands:
//! - provsync start --config <path> [--log-format json|text]
//! - provsync check-config --config <path>
//! - provsync role --config <path>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::observability::LogFormat;

/// provsync - provisioning POD synchronization daemon
#[derive(Parser, Debug)]
#[command(name = "provsync")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the POD daemon
    Start {
        /// Path to configuration file
        #[arg(long, default_value = "./provsync.json")]
        config: PathBuf,

        /// Log output format
        #[arg(long, default_value = "json")]
        log_format: LogFormat,
    },

    /// Validate a configuration file and print the derived settings
    CheckConfig {
        /// Path to configuration file
        #[arg(long, default_value = "./provsync.json")]
        config: PathBuf,
    },

    /// Resolve this host's POD role once and print it
    Role {
        /// Path to configuration file
        #[arg(long, default_value = "./provsync.json")]
        config: PathBuf,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
