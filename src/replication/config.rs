//! Replication Configuration
//!
//! Who the two PODs are, which DNS name designates the ACTIVE one, and
//! how to reach the peer. Immutable after startup.
//!
//! A host that is not one of the two configured PODs is not a
//! configuration error: it runs with role UNKNOWN and never replicates
//! or pokes.

use std::time::Duration;

use super::errors::{ReplicationError, ReplicationResult};

/// Replication configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicationConfig {
    /// This host's name
    pub this_pod: String,

    /// The two POD names
    pub pods: Vec<String>,

    /// DNS name that resolves to the ACTIVE POD
    pub active_pod_name: String,

    /// URL scheme for peer calls (`http` or `https`)
    pub peer_scheme: String,

    /// Port of the peer's internal endpoints
    pub peer_port: u16,

    /// Interval of the role + replication tick
    pub tick_interval: Duration,

    /// Full resync interval when no refresh push arrives
    pub resync_interval: Duration,

    /// Connect timeout for every peer call
    pub connect_timeout: Duration,

    /// Whole-request timeout for every peer call
    pub request_timeout: Duration,
}

impl ReplicationConfig {
    /// Create a configuration with default timings.
    pub fn new(
        this_pod: impl Into<String>,
        pods: Vec<String>,
        active_pod_name: impl Into<String>,
    ) -> Self {
        Self {
            this_pod: this_pod.into(),
            pods,
            active_pod_name: active_pod_name.into(),
            peer_scheme: "https".to_string(),
            peer_port: 8443,
            tick_interval: Duration::from_secs(5),
            resync_interval: Duration::from_secs(3600),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(60),
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> ReplicationResult<()> {
        if self.this_pod.trim().is_empty() {
            return Err(ReplicationError::configuration_error(
                "this_pod must not be empty",
            ));
        }
        if self.pods.len() != 2 {
            return Err(ReplicationError::configuration_error(format!(
                "exactly two POD names are required, found {}",
                self.pods.len()
            )));
        }
        if self.pods[0].eq_ignore_ascii_case(&self.pods[1]) {
            return Err(ReplicationError::configuration_error(
                "the two POD names must differ",
            ));
        }
        if self.active_pod_name.trim().is_empty() {
            return Err(ReplicationError::configuration_error(
                "active_pod_name must not be empty",
            ));
        }
        if self.peer_scheme != "http" && self.peer_scheme != "https" {
            return Err(ReplicationError::configuration_error(format!(
                "peer_scheme must be 'http' or 'https', found '{}'",
                self.peer_scheme
            )));
        }
        if self.tick_interval.is_zero() {
            return Err(ReplicationError::configuration_error(
                "tick interval must be > 0",
            ));
        }
        Ok(())
    }

    /// Whether this host is one of the two PODs.
    pub fn is_pod(&self) -> bool {
        self.pods
            .iter()
            .any(|p| p.eq_ignore_ascii_case(&self.this_pod))
    }

    /// The other POD, when this host is a POD.
    pub fn peer_pod(&self) -> Option<&str> {
        if !self.is_pod() {
            return None;
        }
        self.pods
            .iter()
            .find(|p| !p.eq_ignore_ascii_case(&self.this_pod))
            .map(String::as_str)
    }

    /// Base URL of the peer's internal endpoints.
    pub fn peer_base_url(&self) -> Option<String> {
        self.peer_pod()
            .map(|peer| format!("{}://{}:{}", self.peer_scheme, peer, self.peer_port))
    }
}
