//! Provisioning Snapshot
//!
//! A full point-in-time export of every provisioning entity. The ACTIVE
//! POD serves it; the STANDBY POD pulls it and converges on it.
//!
//! Document layout:
//!
//! ```json
//! {
//!   "feeds": [...], "subscriptions": [...], "groups": [...],
//!   "parameters": {"NODES": "n1|n2"},
//!   "ingress": [...],
//!   "egress": {"42": "n1"},
//!   "routing": [...]
//! }
//! ```

use std::collections::{BTreeMap, BTreeSet};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::entity::{
    EgressRoute, EntityKind, Feed, Group, IngressRoute, NetworkRoute, Parameter,
    ProvisioningEntity, Subscription,
};
use super::errors::StoreResult;
use super::store::ProvisioningStore;
use crate::observability::Event;

/// Snapshot content type, version 1
pub const PROVFULL_CONTENT_TYPE_V1: &str = "application/vnd.provsync.provfeed-full; version=1.0";

/// Snapshot content type, version 2 (served by this crate)
pub const PROVFULL_CONTENT_TYPE_V2: &str = "application/vnd.provsync.provfeed-full; version=2.0";

/// Whether a response content type is an accepted snapshot version.
///
/// Comparison ignores ASCII case and whitespace.
pub fn is_accepted_content_type(content_type: &str) -> bool {
    let normalized = normalize_content_type(content_type);
    normalized == normalize_content_type(PROVFULL_CONTENT_TYPE_V1)
        || normalized == normalize_content_type(PROVFULL_CONTENT_TYPE_V2)
}

fn normalize_content_type(content_type: &str) -> String {
    content_type
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_lowercase()
}

/// Full provisioning snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProvisioningSnapshot {
    pub feeds: Vec<Feed>,
    pub subscriptions: Vec<Subscription>,
    pub groups: Vec<Group>,
    pub parameters: BTreeMap<String, String>,
    pub ingress: Vec<IngressRoute>,
    pub egress: BTreeMap<String, String>,
    pub routing: Vec<NetworkRoute>,
    /// Collections in which at least one entity failed to decode
    #[serde(skip)]
    incomplete: BTreeSet<EntityKind>,
}

/// Loosely typed document, decoded entity by entity
#[derive(Debug, Default, Deserialize)]
struct RawSnapshot {
    #[serde(default)]
    feeds: Vec<Value>,
    #[serde(default)]
    subscriptions: Vec<Value>,
    #[serde(default)]
    groups: Vec<Value>,
    #[serde(default)]
    parameters: serde_json::Map<String, Value>,
    #[serde(default)]
    ingress: Vec<Value>,
    #[serde(default)]
    egress: serde_json::Map<String, Value>,
    #[serde(default)]
    routing: Vec<Value>,
}

impl ProvisioningSnapshot {
    /// Create an empty snapshot
    pub fn new() -> Self {
        Self::default()
    }

    /// Export every entity held by `store`.
    pub fn from_store(store: &dyn ProvisioningStore) -> StoreResult<Self> {
        let mut snapshot = Self::new();
        for kind in EntityKind::ALL {
            for entity in store.load(kind)? {
                snapshot.push(entity);
            }
        }
        Ok(snapshot)
    }

    /// Build a snapshot from a list of entities.
    pub fn from_entities(entities: impl IntoIterator<Item = ProvisioningEntity>) -> Self {
        let mut snapshot = Self::new();
        for entity in entities {
            snapshot.push(entity);
        }
        snapshot
    }

    /// Add one entity to its collection.
    pub fn push(&mut self, entity: ProvisioningEntity) {
        match entity {
            ProvisioningEntity::Feed(f) => self.feeds.push(f),
            ProvisioningEntity::Subscription(s) => self.subscriptions.push(s),
            ProvisioningEntity::Group(g) => self.groups.push(g),
            ProvisioningEntity::Parameter(p) => {
                self.parameters.insert(p.name, p.value);
            }
            ProvisioningEntity::IngressRoute(r) => self.ingress.push(r),
            ProvisioningEntity::EgressRoute(r) => {
                self.egress.insert(r.sub_id.to_string(), r.node);
            }
            ProvisioningEntity::NetworkRoute(r) => self.routing.push(r),
        }
    }

    /// Entities of one kind.
    pub fn entities(&self, kind: EntityKind) -> Vec<ProvisioningEntity> {
        match kind {
            EntityKind::Feed => self.feeds.iter().cloned().map(Into::into).collect(),
            EntityKind::Subscription => {
                self.subscriptions.iter().cloned().map(Into::into).collect()
            }
            EntityKind::Group => self.groups.iter().cloned().map(Into::into).collect(),
            EntityKind::Parameter => self
                .parameters
                .iter()
                .map(|(name, value)| {
                    Parameter {
                        name: name.clone(),
                        value: value.clone(),
                    }
                    .into()
                })
                .collect(),
            EntityKind::IngressRoute => self.ingress.iter().cloned().map(Into::into).collect(),
            EntityKind::EgressRoute => self
                .egress
                .iter()
                .filter_map(|(sub_id, node)| {
                    sub_id.parse::<u64>().ok().map(|sub_id| {
                        EgressRoute {
                            sub_id,
                            node: node.clone(),
                        }
                        .into()
                    })
                })
                .collect(),
            EntityKind::NetworkRoute => self.routing.iter().cloned().map(Into::into).collect(),
        }
    }

    /// Number of entities across all collections.
    pub fn entity_count(&self) -> usize {
        self.feeds.len()
            + self.subscriptions.len()
            + self.groups.len()
            + self.parameters.len()
            + self.ingress.len()
            + self.egress.len()
            + self.routing.len()
    }

    /// Serialize to the snapshot document.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Parse a snapshot document.
    ///
    /// A document that is not a JSON object fails as a whole. Individual
    /// entities that do not decode are skipped with a warning.
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        let raw: RawSnapshot = serde_json::from_str(text)?;

        let mut incomplete = BTreeSet::new();

        let mut parameters = BTreeMap::new();
        for (name, value) in raw.parameters {
            let value = match value {
                Value::String(s) => s,
                Value::Null => String::new(),
                other => other.to_string(),
            };
            parameters.insert(name, value);
        }

        let mut egress = BTreeMap::new();
        for (sub_id, node) in raw.egress {
            match (sub_id.parse::<u64>(), node) {
                (Ok(_), Value::String(node)) => {
                    egress.insert(sub_id, node);
                }
                _ => {
                    incomplete.insert(EntityKind::EgressRoute);
                    tracing::warn!(
                        event = %Event::EntityApplyFailed,
                        collection = "egress",
                        key = %sub_id,
                        "skipping malformed egress route"
                    );
                }
            }
        }

        Ok(Self {
            feeds: decode_each(EntityKind::Feed, raw.feeds, &mut incomplete),
            subscriptions: decode_each(
                EntityKind::Subscription,
                raw.subscriptions,
                &mut incomplete,
            ),
            groups: decode_each(EntityKind::Group, raw.groups, &mut incomplete),
            parameters,
            ingress: decode_each(EntityKind::IngressRoute, raw.ingress, &mut incomplete),
            egress,
            routing: decode_each(EntityKind::NetworkRoute, raw.routing, &mut incomplete),
            incomplete,
        })
    }

    /// Whether every entity of `kind` in the source document decoded.
    ///
    /// Local entities missing from an incomplete collection may be the
    /// ones that failed to decode, so they must not be deleted.
    pub fn is_complete(&self, kind: EntityKind) -> bool {
        !self.incomplete.contains(&kind)
    }
}

fn decode_each<T: DeserializeOwned>(
    kind: EntityKind,
    values: Vec<Value>,
    incomplete: &mut BTreeSet<EntityKind>,
) -> Vec<T> {
    let mut decoded = Vec::with_capacity(values.len());
    for value in values {
        match serde_json::from_value(value) {
            Ok(entity) => decoded.push(entity),
            Err(e) => {
                incomplete.insert(kind);
                tracing::warn!(
                    event = %Event::EntityApplyFailed,
                    collection = %kind,
                    error = %e,
                    "skipping malformed entity"
                );
            }
        }
    }
    decoded
}
