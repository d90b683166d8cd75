//! provsync CLI entry point
//!
//! Parses arguments and dispatches through `cli::run`. Errors go to
//! stderr and exit non-zero. Configuration, logging and every
//! subsystem are set up by the CLI module, never here.

use provsync::cli;

fn main() {
    if let Err(e) = cli::run() {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
