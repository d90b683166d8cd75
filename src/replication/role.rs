//! POD Role Detection
//!
//! DNS is the arbiter: the POD whose address the active name resolves
//! to is ACTIVE, the other is STANDBY. Failover is done by repointing
//! the active name; there is no election protocol here. Stale resolver
//! caches are handled by a short TTL at the process level.
//!
//! State machine, re-evaluated every tick:
//!
//! ```text
//! UNKNOWN <-> ACTIVE <-> STANDBY <-> UNKNOWN
//! ```

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::io;
use std::net::{IpAddr, ToSocketAddrs};
use std::sync::{Arc, RwLock};

use super::config::ReplicationConfig;
use crate::observability::Event;

/// Detected role of this POD
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PodRole {
    /// Not a configured POD, or DNS could not decide
    #[default]
    Unknown,
    /// Authoritative POD
    Active,
    /// Follows the ACTIVE POD
    Standby,
}

impl PodRole {
    /// Get role name for observability.
    pub fn as_str(&self) -> &'static str {
        match self {
            PodRole::Unknown => "UNKNOWN",
            PodRole::Active => "ACTIVE",
            PodRole::Standby => "STANDBY",
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, PodRole::Active)
    }

    pub fn is_standby(&self) -> bool {
        matches!(self, PodRole::Standby)
    }
}

impl fmt::Display for PodRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Host name to address lookup.
pub trait NameResolver: Send + Sync {
    fn resolve(&self, name: &str) -> io::Result<Vec<IpAddr>>;
}

/// Resolver backed by the operating system.
///
/// Blocking; call it off the async executor.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemResolver;

impl NameResolver for SystemResolver {
    fn resolve(&self, name: &str) -> io::Result<Vec<IpAddr>> {
        Ok((name, 0u16).to_socket_addrs()?.map(|a| a.ip()).collect())
    }
}

/// Fixed name table, e.g. for hosts pinned in configuration.
#[derive(Debug, Default)]
pub struct StaticResolver {
    entries: RwLock<HashMap<String, Vec<IpAddr>>>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Point `name` at `addrs`, replacing any previous entry.
    pub fn set(&self, name: &str, addrs: Vec<IpAddr>) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(name.to_ascii_lowercase(), addrs);
    }

    pub fn remove(&self, name: &str) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.remove(&name.to_ascii_lowercase());
    }
}

impl NameResolver for StaticResolver {
    fn resolve(&self, name: &str) -> io::Result<Vec<IpAddr>> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries
            .get(&name.to_ascii_lowercase())
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("unknown host {}", name)))
    }
}

/// Periodic DNS based role classification.
///
/// The role is only ever written by [`refresh`](Self::refresh).
pub struct RoleMonitor {
    config: ReplicationConfig,
    resolver: Arc<dyn NameResolver>,
    role: RwLock<PodRole>,
}

impl RoleMonitor {
    /// Create a monitor in the UNKNOWN role.
    pub fn new(config: ReplicationConfig, resolver: Arc<dyn NameResolver>) -> Self {
        Self {
            config,
            resolver,
            role: RwLock::new(PodRole::Unknown),
        }
    }

    pub fn config(&self) -> &ReplicationConfig {
        &self.config
    }

    /// Role as of the last refresh.
    pub fn current(&self) -> PodRole {
        *self.role.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Classify this POD from fresh DNS answers.
    pub fn detect(&self) -> PodRole {
        if !self.config.is_pod() {
            tracing::warn!(
                event = %Event::RoleUnknown,
                this_pod = %self.config.this_pod,
                pods = ?self.config.pods,
                "this host is not one of the configured PODs"
            );
            return PodRole::Unknown;
        }

        let mine = match self.resolver.resolve(&self.config.this_pod) {
            Ok(addrs) if !addrs.is_empty() => addrs,
            Ok(_) | Err(_) => {
                tracing::warn!(
                    event = %Event::RoleUnknown,
                    name = %self.config.this_pod,
                    "cannot resolve this POD's own name"
                );
                return PodRole::Unknown;
            }
        };

        let active = match self.resolver.resolve(&self.config.active_pod_name) {
            Ok(addrs) if !addrs.is_empty() => addrs,
            Ok(_) | Err(_) => {
                tracing::warn!(
                    event = %Event::RoleUnknown,
                    name = %self.config.active_pod_name,
                    "cannot resolve the active POD name"
                );
                return PodRole::Unknown;
            }
        };

        let mine: HashSet<IpAddr> = mine.into_iter().collect();
        if active.iter().any(|addr| mine.contains(addr)) {
            PodRole::Active
        } else {
            PodRole::Standby
        }
    }

    /// Detect, publish and log the role. Returns the new role.
    pub fn refresh(&self) -> PodRole {
        let detected = self.detect();
        let previous = {
            let mut role = self.role.write().unwrap_or_else(|e| e.into_inner());
            std::mem::replace(&mut *role, detected)
        };

        if previous != detected {
            tracing::info!(
                event = %Event::RoleTransition,
                from = %previous,
                to = %detected,
                "POD role changed"
            );
        }
        detected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    const POD_A: &str = "pod-a.example.net";
    const POD_B: &str = "pod-b.example.net";
    const ACTIVE: &str = "prov.example.net";

    fn ip(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, last))
    }

    fn monitor(this: &str, resolver: Arc<StaticResolver>) -> RoleMonitor {
        let config = ReplicationConfig::new(this, vec![POD_A.into(), POD_B.into()], ACTIVE);
        RoleMonitor::new(config, resolver)
    }

    fn dns() -> Arc<StaticResolver> {
        let resolver = Arc::new(StaticResolver::new());
        resolver.set(POD_A, vec![ip(1)]);
        resolver.set(POD_B, vec![ip(2)]);
        resolver.set(ACTIVE, vec![ip(1)]);
        resolver
    }

    #[test]
    fn test_starts_unknown() {
        assert_eq!(monitor(POD_A, dns()).current(), PodRole::Unknown);
    }

    #[test]
    fn test_active_and_standby() {
        let resolver = dns();
        assert_eq!(monitor(POD_A, resolver.clone()).refresh(), PodRole::Active);
        assert_eq!(monitor(POD_B, resolver).refresh(), PodRole::Standby);
    }

    #[test]
    fn test_failover_by_repointing_name() {
        let resolver = dns();
        let b = monitor(POD_B, resolver.clone());
        assert_eq!(b.refresh(), PodRole::Standby);

        resolver.set(ACTIVE, vec![ip(2)]);
        assert_eq!(b.refresh(), PodRole::Active);
        assert_eq!(b.current(), PodRole::Active);
    }

    #[test]
    fn test_host_outside_pod_list_is_unknown() {
        assert_eq!(monitor("laptop", dns()).refresh(), PodRole::Unknown);
    }

    #[test]
    fn test_resolution_failure_is_unknown() {
        let resolver = dns();
        let a = monitor(POD_A, resolver.clone());
        assert_eq!(a.refresh(), PodRole::Active);

        resolver.remove(ACTIVE);
        assert_eq!(a.refresh(), PodRole::Unknown);
    }

    #[test]
    fn test_multi_address_overlap() {
        let resolver = dns();
        resolver.set(POD_A, vec![ip(1), ip(9)]);
        resolver.set(ACTIVE, vec![ip(9)]);
        assert_eq!(monitor(POD_A, resolver).refresh(), PodRole::Active);
    }

    #[test]
    fn test_role_names() {
        assert_eq!(PodRole::Unknown.as_str(), "UNKNOWN");
        assert_eq!(PodRole::Active.to_string(), "ACTIVE");
        assert!(PodRole::Standby.is_standby());
    }
}
