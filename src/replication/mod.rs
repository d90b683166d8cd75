//! Replication Subsystem
//!
//! - Role detection: DNS decides which POD is ACTIVE
//! - The ACTIVE POD is ground truth; the STANDBY POD pulls from it
//! - Entity sync and log replication are idempotent and retried every tick
//! - No failure here ever stops the process
//!
//! Only a STANDBY POD pulls. An UNKNOWN POD neither pulls nor pokes
//! until its configuration or DNS is corrected.

mod config;
mod coordinator;
mod errors;
mod peer;
mod role;

pub use config::ReplicationConfig;
pub use coordinator::{sync_collection, ReplicationCoordinator, SyncOutcome, FETCHED_PREFIX};
pub use errors::{ReplicationError, ReplicationErrorKind, ReplicationResult};
pub use peer::{
    build_http_client, poke, PeerClient, FETCH_PROV_PATH, LOGS_PATH, PROV_PATH, TEXT_PLAIN,
};
pub use role::{NameResolver, PodRole, RoleMonitor, StaticResolver, SystemResolver};
