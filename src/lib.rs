//! provsync - provisioning POD synchronization
//!
//! Keeps the STANDBY provisioning POD's configuration and log history
//! converged on the ACTIVE POD, and announces provisioning changes to
//! downstream nodes.

pub mod bitset;
pub mod cli;
pub mod config;
pub mod http_server;
pub mod logs;
pub mod notify;
pub mod observability;
pub mod pod;
pub mod provisioning;
pub mod replication;
