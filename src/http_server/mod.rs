//! # Internal HTTP Server Module
//!
//! The endpoints one POD serves to the other, built on axum.
//!
//! # Endpoints
//!
//! - `/internal/prov` - Provisioning snapshot
//! - `/internal/logs` - Record id bitset (GET) and record fetch (POST)
//! - `/internal/fetchProv` - Refresh push receiver
//! - `/health` - Health check

pub mod config;
pub mod internal_routes;
pub mod server;

pub use config::HttpServerConfig;
pub use internal_routes::{internal_routes, HealthResponse, InternalState};
pub use server::HttpServer;
