//! CLI command implementations
//!
//! `start` boots in a fixed order:
//!
//! 1. Install the log subscriber
//! 2. Load and validate configuration
//! 3. Build the POD (stores, allocator, ingestor, monitor, notifier, coordinator)
//! 4. Start the HTTP listener and the background loops
//! 5. Wait for ctrl-c, then shut every loop down

use std::path::Path;

use serde_json::json;

use crate::config::Config;
use crate::observability::{init_logging, log_event, Event, LogFormat, DEFAULT_FILTER};
use crate::pod::Pod;
use crate::replication::{RoleMonitor, SystemResolver};

use super::args::Command;
use super::errors::{CliError, CliResult};

/// Dispatch a parsed command.
pub fn run_command(command: Command) -> CliResult<()> {
    match command {
        Command::Start { config, log_format } => start(&config, log_format),
        Command::CheckConfig { config } => check_config(&config),
        Command::Role { config } => role(&config),
    }
}

/// Run the daemon until interrupted.
pub fn start(config_path: &Path, log_format: LogFormat) -> CliResult<()> {
    init_logging(log_format, DEFAULT_FILTER)?;
    log_event(Event::BootStart);

    let config = Config::load(config_path)?;
    tracing::info!(
        event = %Event::ConfigLoaded,
        path = %config_path.display(),
        this_pod = %config.this_pod,
        band = %config.band(),
        "configuration loaded"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| CliError::boot_failed(format!("tokio runtime: {}", e)))?;

    runtime.block_on(async move {
        let pod = Pod::build(config)?;
        let handle = pod.start().await?;

        tokio::signal::ctrl_c()
            .await
            .map_err(|e| CliError::io_error(format!("signal handler: {}", e)))?;

        handle.shutdown().await;
        Ok::<(), CliError>(())
    })
}

/// Validate configuration and print the settings derived from it.
pub fn check_config(config_path: &Path) -> CliResult<()> {
    let config = Config::load(config_path)?;
    let replication = config.replication_config();

    let summary = json!({
        "this_pod": &config.this_pod,
        "is_pod": replication.is_pod(),
        "peer": replication.peer_base_url(),
        "band": config.band().to_string(),
        "band_start": config.band().start(),
        "spool_dir": &config.spool_dir,
        "listen": config.http.socket_addr(),
        "fallback_nodes": &config.nodes,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

/// Resolve and print the role this host would have right now.
pub fn role(config_path: &Path) -> CliResult<()> {
    let config = Config::load(config_path)?;
    let monitor = RoleMonitor::new(
        config.replication_config(),
        std::sync::Arc::new(SystemResolver),
    );
    println!("{}", monitor.detect());
    Ok(())
}
