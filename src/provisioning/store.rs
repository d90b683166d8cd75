//! Provisioning Store
//!
//! Persistence seam for provisioning entities. The relational layer
//! that backs a production POD lives outside this crate; it only has to
//! implement [`ProvisioningStore`].

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use super::entity::{EntityKind, ProvisioningEntity};
use super::errors::{StoreError, StoreResult};

/// Load/insert/update/delete of provisioning entities.
pub trait ProvisioningStore: Send + Sync {
    /// All stored entities of one kind.
    fn load(&self, kind: EntityKind) -> StoreResult<Vec<ProvisioningEntity>>;

    /// Insert a new entity. Fails if the key already exists.
    fn insert(&self, entity: &ProvisioningEntity) -> StoreResult<()>;

    /// Replace the stored entity with the same key.
    fn update(&self, entity: &ProvisioningEntity) -> StoreResult<()>;

    /// Remove the stored entity with the same key.
    fn delete(&self, entity: &ProvisioningEntity) -> StoreResult<()>;

    /// Side effect of an ownership transfer, applied after `update`.
    ///
    /// Backends that keep per-owner bookkeeping (publisher feed lists,
    /// subscriber quotas) refresh it here.
    fn change_ownership(&self, entity: &ProvisioningEntity) -> StoreResult<()>;

    /// Look up a parameter value by name.
    fn parameter(&self, name: &str) -> StoreResult<Option<String>> {
        let params = self.load(EntityKind::Parameter)?;
        Ok(params.into_iter().find_map(|entity| match entity {
            ProvisioningEntity::Parameter(p) if p.name == name => Some(p.value),
            _ => None,
        }))
    }
}

/// Write counters for a store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteStats {
    pub inserts: u64,
    pub updates: u64,
    pub deletes: u64,
    pub ownership_changes: u64,
}

impl WriteStats {
    /// Total writes of any kind.
    pub fn total(&self) -> u64 {
        self.inserts + self.updates + self.deletes + self.ownership_changes
    }
}

/// In-memory provisioning store
#[derive(Debug, Default)]
pub struct MemoryProvisioningStore {
    entities: RwLock<BTreeMap<(EntityKind, String), ProvisioningEntity>>,
    inserts: AtomicU64,
    updates: AtomicU64,
    deletes: AtomicU64,
    ownership_changes: AtomicU64,
}

impl MemoryProvisioningStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding `entities`, without counting them as writes.
    pub fn with_entities(entities: impl IntoIterator<Item = ProvisioningEntity>) -> Self {
        let store = Self::new();
        if let Ok(mut map) = store.entities.write() {
            for entity in entities {
                map.insert((entity.kind(), entity.key()), entity);
            }
        }
        store
    }

    /// Snapshot of the write counters
    pub fn write_stats(&self) -> WriteStats {
        WriteStats {
            inserts: self.inserts.load(Ordering::Relaxed),
            updates: self.updates.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            ownership_changes: self.ownership_changes.load(Ordering::Relaxed),
        }
    }

    /// Get one entity by kind and key
    pub fn get(&self, kind: EntityKind, key: &str) -> Option<ProvisioningEntity> {
        self.entities
            .read()
            .ok()
            .and_then(|map| map.get(&(kind, key.to_string())).cloned())
    }

    /// Number of stored entities across all kinds
    pub fn len(&self) -> usize {
        self.entities.read().map(|map| map.len()).unwrap_or(0)
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock_err() -> StoreError {
        StoreError::Backend("Lock poisoned".into())
    }
}

impl ProvisioningStore for MemoryProvisioningStore {
    fn load(&self, kind: EntityKind) -> StoreResult<Vec<ProvisioningEntity>> {
        let map = self.entities.read().map_err(|_| Self::lock_err())?;
        Ok(map
            .iter()
            .filter(|((k, _), _)| *k == kind)
            .map(|(_, entity)| entity.clone())
            .collect())
    }

    fn insert(&self, entity: &ProvisioningEntity) -> StoreResult<()> {
        let mut map = self.entities.write().map_err(|_| Self::lock_err())?;
        let id = (entity.kind(), entity.key());
        if map.contains_key(&id) {
            return Err(StoreError::AlreadyExists {
                kind: id.0,
                key: id.1,
            });
        }
        map.insert(id, entity.clone());
        self.inserts.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn update(&self, entity: &ProvisioningEntity) -> StoreResult<()> {
        let mut map = self.entities.write().map_err(|_| Self::lock_err())?;
        match map.get_mut(&(entity.kind(), entity.key())) {
            Some(slot) => {
                *slot = entity.clone();
                self.updates.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            None => Err(StoreError::NotFound {
                kind: entity.kind(),
                key: entity.key(),
            }),
        }
    }

    fn delete(&self, entity: &ProvisioningEntity) -> StoreResult<()> {
        let mut map = self.entities.write().map_err(|_| Self::lock_err())?;
        match map.remove(&(entity.kind(), entity.key())) {
            Some(_) => {
                self.deletes.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            None => Err(StoreError::NotFound {
                kind: entity.kind(),
                key: entity.key(),
            }),
        }
    }

    fn change_ownership(&self, entity: &ProvisioningEntity) -> StoreResult<()> {
        let map = self.entities.read().map_err(|_| Self::lock_err())?;
        if !map.contains_key(&(entity.kind(), entity.key())) {
            return Err(StoreError::NotFound {
                kind: entity.kind(),
                key: entity.key(),
            });
        }
        self.ownership_changes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
