//! Provisioning Entities
//!
//! The seven entity kinds a POD stores. Entities are compared across
//! PODs by key, and by full content once keys match.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Entity kind, one per snapshot collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EntityKind {
    Feed,
    Subscription,
    Group,
    Parameter,
    IngressRoute,
    EgressRoute,
    NetworkRoute,
}

impl EntityKind {
    /// Every kind, in snapshot document order.
    pub const ALL: [EntityKind; 7] = [
        EntityKind::Feed,
        EntityKind::Subscription,
        EntityKind::Group,
        EntityKind::Parameter,
        EntityKind::IngressRoute,
        EntityKind::EgressRoute,
        EntityKind::NetworkRoute,
    ];

    /// Returns the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Feed => "feed",
            EntityKind::Subscription => "subscription",
            EntityKind::Group => "group",
            EntityKind::Parameter => "parameter",
            EntityKind::IngressRoute => "ingress_route",
            EntityKind::EgressRoute => "egress_route",
            EntityKind::NetworkRoute => "network_route",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A data feed that publishers post files to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feed {
    pub feed_id: u64,
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub description: String,
    /// Owning publisher
    pub publisher: String,
    #[serde(default)]
    pub group_id: u64,
    #[serde(default)]
    pub suspended: bool,
}

/// A subscription delivering one feed to one endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub sub_id: u64,
    pub feed_id: u64,
    pub delivery_url: String,
    /// Owning subscriber
    pub subscriber: String,
    #[serde(default)]
    pub group_id: u64,
    #[serde(default)]
    pub metadata_only: bool,
    #[serde(default)]
    pub suspended: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub group_id: u64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub classification: String,
}

/// A named system parameter, e.g. `NODES` or `ACTIVE_POD`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub value: String,
}

/// Maps an incoming publish (feed, user, subnet) to an ordered node list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngressRoute {
    pub seq: u64,
    pub feed_id: u64,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub subnet: String,
    pub nodes: Vec<String>,
}

/// Pins delivery of one subscription to one node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EgressRoute {
    pub sub_id: u64,
    pub node: String,
}

/// Node-to-node forwarding hop
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkRoute {
    pub from_node: String,
    pub to_node: String,
    pub via_node: String,
}

/// Any provisioning entity.
///
/// Equality is content equality; identity across PODs is [`key`](Self::key).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisioningEntity {
    Feed(Feed),
    Subscription(Subscription),
    Group(Group),
    Parameter(Parameter),
    IngressRoute(IngressRoute),
    EgressRoute(EgressRoute),
    NetworkRoute(NetworkRoute),
}

impl ProvisioningEntity {
    pub fn kind(&self) -> EntityKind {
        match self {
            ProvisioningEntity::Feed(_) => EntityKind::Feed,
            ProvisioningEntity::Subscription(_) => EntityKind::Subscription,
            ProvisioningEntity::Group(_) => EntityKind::Group,
            ProvisioningEntity::Parameter(_) => EntityKind::Parameter,
            ProvisioningEntity::IngressRoute(_) => EntityKind::IngressRoute,
            ProvisioningEntity::EgressRoute(_) => EntityKind::EgressRoute,
            ProvisioningEntity::NetworkRoute(_) => EntityKind::NetworkRoute,
        }
    }

    /// Stable identity used to match entities between PODs.
    pub fn key(&self) -> String {
        match self {
            ProvisioningEntity::Feed(f) => f.feed_id.to_string(),
            ProvisioningEntity::Subscription(s) => s.sub_id.to_string(),
            ProvisioningEntity::Group(g) => g.group_id.to_string(),
            ProvisioningEntity::Parameter(p) => p.name.clone(),
            ProvisioningEntity::IngressRoute(r) => r.seq.to_string(),
            ProvisioningEntity::EgressRoute(r) => r.sub_id.to_string(),
            ProvisioningEntity::NetworkRoute(r) => format!("{}:{}", r.from_node, r.to_node),
        }
    }

    /// Publisher of a feed or subscriber of a subscription.
    pub fn owner(&self) -> Option<&str> {
        match self {
            ProvisioningEntity::Feed(f) => Some(&f.publisher),
            ProvisioningEntity::Subscription(s) => Some(&s.subscriber),
            _ => None,
        }
    }

    /// Whether replacing `previous` with `self` hands the entity to a new owner.
    pub fn is_ownership_transfer(&self, previous: &ProvisioningEntity) -> bool {
        match (self.owner(), previous.owner()) {
            (Some(new_owner), Some(old_owner)) => new_owner != old_owner,
            _ => false,
        }
    }
}

impl From<Feed> for ProvisioningEntity {
    fn from(feed: Feed) -> Self {
        ProvisioningEntity::Feed(feed)
    }
}

impl From<Subscription> for ProvisioningEntity {
    fn from(sub: Subscription) -> Self {
        ProvisioningEntity::Subscription(sub)
    }
}

impl From<Group> for ProvisioningEntity {
    fn from(group: Group) -> Self {
        ProvisioningEntity::Group(group)
    }
}

impl From<Parameter> for ProvisioningEntity {
    fn from(param: Parameter) -> Self {
        ProvisioningEntity::Parameter(param)
    }
}

impl From<IngressRoute> for ProvisioningEntity {
    fn from(route: IngressRoute) -> Self {
        ProvisioningEntity::IngressRoute(route)
    }
}

impl From<EgressRoute> for ProvisioningEntity {
    fn from(route: EgressRoute) -> Self {
        ProvisioningEntity::EgressRoute(route)
    }
}

impl From<NetworkRoute> for ProvisioningEntity {
    fn from(route: NetworkRoute) -> Self {
        ProvisioningEntity::NetworkRoute(route)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(id: u64, publisher: &str) -> ProvisioningEntity {
        Feed {
            feed_id: id,
            name: format!("feed-{}", id),
            version: "v1".into(),
            description: String::new(),
            publisher: publisher.into(),
            group_id: 0,
            suspended: false,
        }
        .into()
    }

    #[test]
    fn test_keys() {
        assert_eq!(feed(12, "alice").key(), "12");

        let route: ProvisioningEntity = NetworkRoute {
            from_node: "n1".into(),
            to_node: "n3".into(),
            via_node: "n2".into(),
        }
        .into();
        assert_eq!(route.key(), "n1:n3");
        assert_eq!(route.kind(), EntityKind::NetworkRoute);
    }

    #[test]
    fn test_ownership_transfer() {
        let before = feed(1, "alice");
        let after = feed(1, "bob");
        assert!(after.is_ownership_transfer(&before));
        assert!(!before.is_ownership_transfer(&before.clone()));
    }

    #[test]
    fn test_unowned_kinds_never_transfer() {
        let a: ProvisioningEntity = Parameter {
            name: "NODES".into(),
            value: "a".into(),
        }
        .into();
        let b: ProvisioningEntity = Parameter {
            name: "NODES".into(),
            value: "b".into(),
        }
        .into();
        assert!(a.owner().is_none());
        assert!(!a.is_ownership_transfer(&b));
    }

    #[test]
    fn test_kind_order_is_document_order() {
        assert_eq!(EntityKind::ALL[0], EntityKind::Feed);
        assert_eq!(EntityKind::ALL[6], EntityKind::NetworkRoute);
        assert_eq!(EntityKind::IngressRoute.to_string(), "ingress_route");
    }
}
