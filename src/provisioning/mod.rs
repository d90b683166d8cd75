//! Provisioning Data
//!
//! Feeds, subscriptions, groups, parameters and the three route tables,
//! plus the full snapshot document exchanged between PODs.
//!
//! The ACTIVE POD's copy is ground truth. The STANDBY POD's copy is
//! derived from it and overwritten during sync.

mod entity;
mod errors;
mod snapshot;
mod store;

pub use entity::{
    EgressRoute, EntityKind, Feed, Group, IngressRoute, NetworkRoute, Parameter,
    ProvisioningEntity, Subscription,
};
pub use errors::{StoreError, StoreResult};
pub use snapshot::{
    is_accepted_content_type, ProvisioningSnapshot, PROVFULL_CONTENT_TYPE_V1,
    PROVFULL_CONTENT_TYPE_V2,
};
pub use store::{MemoryProvisioningStore, ProvisioningStore, WriteStats};
