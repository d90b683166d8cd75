//! Daemon Configuration
//!
//! One JSON file, loaded once at startup. Every field except the POD
//! identities has a default.
//!
//! ```json
//! {
//!   "this_pod": "pod-a.example.net",
//!   "pods": ["pod-a.example.net", "pod-b.example.net"],
//!   "active_pod_name": "prov.example.net",
//!   "initial_active_pod": "pod-a.example.net",
//!   "initial_standby_pod": "pod-b.example.net",
//!   "spool_dir": "/var/spool/provsync",
//!   "http": {"port": 8443}
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::http_server::HttpServerConfig;
use crate::logs::{Band, IngestConfig, DEFAULT_PRUNE_BATCH_LIMIT, DEFAULT_RETENTION_THRESHOLD};
use crate::notify::NotifierConfig;
use crate::replication::ReplicationConfig;

/// Configuration errors. Fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

impl ConfigError {
    fn invalid(message: impl Into<String>) -> Self {
        ConfigError::Invalid(message.into())
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration file structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// This host's name (required)
    pub this_pod: String,

    /// The two POD names (required)
    pub pods: Vec<String>,

    /// DNS name resolving to the ACTIVE POD (required)
    pub active_pod_name: String,

    /// POD configured as active at install time; selects id band 0
    #[serde(default)]
    pub initial_active_pod: String,

    /// POD configured as standby at install time; selects id band 1
    #[serde(default)]
    pub initial_standby_pod: String,

    /// Downstream nodes poked when the NODES parameter is unset
    #[serde(default)]
    pub nodes: Vec<String>,

    /// Inbound log spool directory
    #[serde(default = "default_spool_dir")]
    pub spool_dir: PathBuf,

    /// Internal endpoint listener
    #[serde(default)]
    pub http: HttpServerConfig,

    /// Scheme for peer calls and pokes (default: "https")
    #[serde(default = "default_peer_scheme")]
    pub peer_scheme: String,

    /// Port the peer serves its internal endpoints on (default: 8443)
    #[serde(default = "default_peer_port")]
    pub peer_port: u16,

    #[serde(default = "default_role_tick_secs")]
    pub role_tick_secs: u64,

    #[serde(default = "default_resync_interval_secs")]
    pub resync_interval_secs: u64,

    #[serde(default = "default_poke_soft_delay_ms")]
    pub poke_soft_delay_ms: u64,

    #[serde(default = "default_poke_hard_delay_ms")]
    pub poke_hard_delay_ms: u64,

    /// Row count above which old days are pruned
    #[serde(default = "default_retention_threshold")]
    pub retention_threshold: u64,

    /// Maximum rows deleted per prune
    #[serde(default = "default_prune_batch_limit")]
    pub prune_batch_limit: u64,

    #[serde(default = "default_ingest_poll_ms")]
    pub ingest_poll_ms: u64,

    #[serde(default = "default_http_connect_timeout_ms")]
    pub http_connect_timeout_ms: u64,

    #[serde(default = "default_http_read_timeout_ms")]
    pub http_read_timeout_ms: u64,
}

fn default_spool_dir() -> PathBuf {
    PathBuf::from("./spool")
}
fn default_peer_scheme() -> String {
    "https".to_string()
}
fn default_peer_port() -> u16 {
    8443
}
fn default_role_tick_secs() -> u64 {
    5
}
fn default_resync_interval_secs() -> u64 {
    3600
}
fn default_poke_soft_delay_ms() -> u64 {
    5_000
}
fn default_poke_hard_delay_ms() -> u64 {
    30_000
}
fn default_retention_threshold() -> u64 {
    DEFAULT_RETENTION_THRESHOLD
}
fn default_prune_batch_limit() -> u64 {
    DEFAULT_PRUNE_BATCH_LIMIT
}
fn default_ingest_poll_ms() -> u64 {
    1_000
}
fn default_http_connect_timeout_ms() -> u64 {
    10_000
}
fn default_http_read_timeout_ms() -> u64 {
    60_000
}

impl Config {
    /// Load and validate configuration from file
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content)
    }

    /// Parse and validate configuration text
    pub fn from_json(content: &str) -> ConfigResult<Self> {
        let config: Config = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> ConfigResult<()> {
        self.replication_config()
            .validate()
            .map_err(|e| ConfigError::invalid(e.message))?;

        if self.role_tick_secs == 0 {
            return Err(ConfigError::invalid("role_tick_secs must be > 0"));
        }
        if self.ingest_poll_ms == 0 {
            return Err(ConfigError::invalid("ingest_poll_ms must be > 0"));
        }
        if self.poke_hard_delay_ms < self.poke_soft_delay_ms {
            return Err(ConfigError::invalid(format!(
                "poke_hard_delay_ms ({}) must not be below poke_soft_delay_ms ({})",
                self.poke_hard_delay_ms, self.poke_soft_delay_ms
            )));
        }
        if self.prune_batch_limit == 0 {
            return Err(ConfigError::invalid("prune_batch_limit must be > 0"));
        }
        if self.spool_dir.as_os_str().is_empty() {
            return Err(ConfigError::invalid("spool_dir must not be empty"));
        }
        Ok(())
    }

    /// Record id band of this host, from the install-time roles.
    pub fn band(&self) -> Band {
        Band::for_pod(
            &self.this_pod,
            &self.initial_active_pod,
            &self.initial_standby_pod,
        )
    }

    pub fn replication_config(&self) -> ReplicationConfig {
        ReplicationConfig {
            peer_scheme: self.peer_scheme.clone(),
            peer_port: self.peer_port,
            tick_interval: Duration::from_secs(self.role_tick_secs),
            resync_interval: Duration::from_secs(self.resync_interval_secs),
            connect_timeout: Duration::from_millis(self.http_connect_timeout_ms),
            request_timeout: Duration::from_millis(self.http_read_timeout_ms),
            ..ReplicationConfig::new(
                self.this_pod.clone(),
                self.pods.clone(),
                self.active_pod_name.clone(),
            )
        }
    }

    pub fn ingest_config(&self) -> IngestConfig {
        IngestConfig {
            retention_threshold: self.retention_threshold,
            prune_batch_limit: self.prune_batch_limit,
            poll_interval: Duration::from_millis(self.ingest_poll_ms),
            ..IngestConfig::new(self.spool_dir.clone())
        }
    }

    pub fn notifier_config(&self) -> NotifierConfig {
        NotifierConfig {
            soft_delay: Duration::from_millis(self.poke_soft_delay_ms),
            hard_delay: Duration::from_millis(self.poke_hard_delay_ms),
            fallback_nodes: self.nodes.clone(),
            node_scheme: self.peer_scheme.clone(),
            peer_base_url: self.replication_config().peer_base_url(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const MINIMAL: &str = r#"{
        "this_pod": "pod-b",
        "pods": ["pod-a", "pod-b"],
        "active_pod_name": "prov",
        "initial_active_pod": "pod-a",
        "initial_standby_pod": "pod-b"
    }"#;

    #[test]
    fn test_defaults() {
        let config = Config::from_json(MINIMAL).unwrap();
        assert_eq!(config.http.port, 8443);
        assert_eq!(config.peer_scheme, "https");
        assert_eq!(config.retention_threshold, 10_000_000);
        assert_eq!(config.poke_soft_delay_ms, 5_000);
        assert_eq!(config.poke_hard_delay_ms, 30_000);
        assert_eq!(config.band(), Band::InitialStandby);
    }

    #[test]
    fn test_derived_configs() {
        let config = Config::from_json(MINIMAL).unwrap();
        let repl = config.replication_config();
        assert_eq!(repl.peer_pod(), Some("pod-a"));
        assert_eq!(repl.tick_interval, Duration::from_secs(5));

        let notify = config.notifier_config();
        assert_eq!(notify.peer_base_url.as_deref(), Some("https://pod-a:8443"));
        assert_eq!(config.ingest_config().poll_interval, Duration::from_secs(1));
    }

    #[test]
    fn test_missing_required_field() {
        let err = Config::from_json(r#"{"this_pod": "pod-a"}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_single_pod_rejected() {
        let text = r#"{"this_pod": "a", "pods": ["a"], "active_pod_name": "prov"}"#;
        assert!(matches!(Config::from_json(text), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_hard_delay_below_soft_rejected() {
        let mut config = Config::from_json(MINIMAL).unwrap();
        config.poke_hard_delay_ms = 1_000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(MINIMAL.as_bytes()).unwrap();
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.this_pod, "pod-b");

        let err = Config::load(Path::new("/nonexistent/provsync.json")).unwrap_err();
        assert!(err.to_string().contains("failed to read config"));
    }
}
