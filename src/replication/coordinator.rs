//! Replication Coordinator
//!
//! Runs in the role tick. On a STANDBY POD each tick may:
//!
//! 1. Pull the ACTIVE POD's snapshot and converge every entity
//!    collection on it (insert only-remote, delete only-local, update
//!    changed, plus the ownership side effect)
//! 2. Pull the peer's record bitset, request the records missing
//!    locally and drop them into the spool for the ingestor
//!
//! ACTIVE and UNKNOWN PODs skip both. All convergence is idempotent, so
//! a pass that fails half way is simply repeated on a later tick.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use super::errors::{ReplicationError, ReplicationResult};
use super::peer::PeerClient;
use super::role::{PodRole, RoleMonitor};
use crate::bitset::RangeBitset;
use crate::logs::{spool, LogIngestor};
use crate::notify::ChangeNotifier;
use crate::observability::Event;
use crate::provisioning::{EntityKind, ProvisioningEntity, ProvisioningSnapshot, ProvisioningStore};

/// Spool file prefix for records fetched from the peer
pub const FETCHED_PREFIX: &str = "fetched";

/// Writes performed by one sync pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOutcome {
    pub inserted: u64,
    pub updated: u64,
    pub deleted: u64,
    pub ownership_changes: u64,
    /// Store writes that failed and were skipped
    pub failed: u64,
}

impl SyncOutcome {
    /// Whether any entity was inserted, updated or deleted.
    pub fn changed(&self) -> bool {
        self.inserted + self.updated + self.deleted > 0
    }
}

/// Converge one collection of `store` from `local` to `remote`.
///
/// Entities are matched by key. A failed write is logged, counted in
/// `outcome.failed`, and the next entity is processed. Local-only
/// entities are deleted only when `delete_local_only` is set.
pub fn sync_collection(
    store: &dyn ProvisioningStore,
    local: Vec<ProvisioningEntity>,
    remote: Vec<ProvisioningEntity>,
    delete_local_only: bool,
    outcome: &mut SyncOutcome,
) {
    let mut local: BTreeMap<String, ProvisioningEntity> =
        local.into_iter().map(|e| (e.key(), e)).collect();
    let remote: BTreeMap<String, ProvisioningEntity> =
        remote.into_iter().map(|e| (e.key(), e)).collect();

    for (key, theirs) in &remote {
        match local.remove(key) {
            None => match store.insert(theirs) {
                Ok(()) => outcome.inserted += 1,
                Err(e) => apply_failed(outcome, theirs, "insert", &e),
            },
            Some(ours) if ours == *theirs => {}
            Some(ours) => {
                if let Err(e) = store.update(theirs) {
                    apply_failed(outcome, theirs, "update", &e);
                    continue;
                }
                outcome.updated += 1;

                if theirs.is_ownership_transfer(&ours) {
                    match store.change_ownership(theirs) {
                        Ok(()) => {
                            outcome.ownership_changes += 1;
                            tracing::info!(
                                event = %Event::OwnershipTransferred,
                                kind = %theirs.kind(),
                                key = %key,
                                from = ours.owner().unwrap_or_default(),
                                to = theirs.owner().unwrap_or_default(),
                                "entity changed owner"
                            );
                        }
                        Err(e) => apply_failed(outcome, theirs, "change_ownership", &e),
                    }
                }
            }
        }
    }

    // Whatever is left exists only locally.
    if !delete_local_only {
        if !local.is_empty() {
            tracing::warn!(
                kept = local.len(),
                "remote collection incomplete; local-only entities kept"
            );
        }
        return;
    }
    for ours in local.values() {
        match store.delete(ours) {
            Ok(()) => outcome.deleted += 1,
            Err(e) => apply_failed(outcome, ours, "delete", &e),
        }
    }
}

fn apply_failed(
    outcome: &mut SyncOutcome,
    entity: &ProvisioningEntity,
    op: &str,
    err: &dyn std::fmt::Display,
) {
    outcome.failed += 1;
    tracing::warn!(
        event = %Event::EntityApplyFailed,
        kind = %entity.kind(),
        key = %entity.key(),
        op,
        error = %err,
        "entity write failed"
    );
}

/// STANDBY side of provisioning and log replication
pub struct ReplicationCoordinator {
    monitor: Arc<RoleMonitor>,
    store: Arc<dyn ProvisioningStore>,
    ingestor: Arc<LogIngestor>,
    notifier: Arc<ChangeNotifier>,
    peer: Option<PeerClient>,
    resync_interval: Duration,
    do_fetch: AtomicBool,
    last_sync: Mutex<Option<Instant>>,
}

impl ReplicationCoordinator {
    /// Create a coordinator. `peer` is `None` on a host that is not a POD.
    pub fn new(
        monitor: Arc<RoleMonitor>,
        store: Arc<dyn ProvisioningStore>,
        ingestor: Arc<LogIngestor>,
        notifier: Arc<ChangeNotifier>,
        peer: Option<PeerClient>,
    ) -> Self {
        let resync_interval = monitor.config().resync_interval;
        Self {
            monitor,
            store,
            ingestor,
            notifier,
            peer,
            resync_interval,
            do_fetch: AtomicBool::new(true),
            last_sync: Mutex::new(None),
        }
    }

    pub fn monitor(&self) -> &Arc<RoleMonitor> {
        &self.monitor
    }

    /// Force a snapshot pull on the next STANDBY tick.
    pub fn request_fetch(&self) {
        self.do_fetch.store(true, Ordering::SeqCst);
    }

    pub fn fetch_requested(&self) -> bool {
        self.do_fetch.load(Ordering::SeqCst)
    }

    /// Consume a pending fetch request.
    pub fn take_fetch_request(&self) -> bool {
        self.do_fetch.swap(false, Ordering::SeqCst)
    }

    fn resync_due(&self) -> bool {
        let last = self.last_sync.lock().unwrap_or_else(|e| e.into_inner());
        match *last {
            Some(at) => at.elapsed() >= self.resync_interval,
            None => true,
        }
    }

    fn mark_synced(&self) {
        let mut last = self.last_sync.lock().unwrap_or_else(|e| e.into_inner());
        *last = Some(Instant::now());
    }

    /// Converge the local store on `snapshot`.
    ///
    /// Raises exactly one change signal when anything was written. A
    /// collection whose local copy cannot be loaded is skipped.
    pub fn apply_snapshot(&self, snapshot: &ProvisioningSnapshot) -> SyncOutcome {
        let mut outcome = SyncOutcome::default();

        for kind in EntityKind::ALL {
            let local = match self.store.load(kind) {
                Ok(local) => local,
                Err(e) => {
                    outcome.failed += 1;
                    tracing::warn!(
                        event = %Event::EntityApplyFailed,
                        kind = %kind,
                        error = %e,
                        "cannot load local collection; skipped"
                    );
                    continue;
                }
            };
            sync_collection(
                self.store.as_ref(),
                local,
                snapshot.entities(kind),
                snapshot.is_complete(kind),
                &mut outcome,
            );
        }

        if outcome.changed() {
            self.notifier.provisioning_data_changed();
        }

        tracing::info!(
            event = %Event::SyncComplete,
            inserted = outcome.inserted,
            updated = outcome.updated,
            deleted = outcome.deleted,
            ownership_changes = outcome.ownership_changes,
            failed = outcome.failed,
            "provisioning sync applied"
        );
        outcome
    }

    /// Records the peer has and this POD lacks, or `None` if there are none.
    pub fn missing_records(&self, remote: &RangeBitset) -> Option<RangeBitset> {
        let mut missing = remote.clone();
        missing.and_not(&self.ingestor.bitset());
        if missing.is_empty() {
            None
        } else {
            Some(missing)
        }
    }

    /// Pull and apply the peer snapshot if forced or the resync interval passed.
    ///
    /// Returns `Ok(None)` when no pull was due.
    pub async fn sync_if_due(&self) -> ReplicationResult<Option<SyncOutcome>> {
        let Some(peer) = &self.peer else {
            return Ok(None);
        };

        let forced = self.take_fetch_request();
        if !forced && !self.resync_due() {
            return Ok(None);
        }

        tracing::info!(event = %Event::SyncStart, peer = peer.base_url(), forced, "pulling provisioning snapshot");
        let snapshot = match peer.fetch_snapshot().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                self.request_fetch();
                tracing::warn!(event = %Event::SyncFailed, peer = peer.base_url(), error = %e, "snapshot pull failed");
                return Err(e);
            }
        };

        let outcome = self.apply_snapshot(&snapshot);
        self.mark_synced();
        Ok(Some(outcome))
    }

    /// Fetch records the peer has and this POD lacks into the spool.
    ///
    /// Skipped while an ingest pass is running. Returns the number of
    /// record ids requested.
    pub async fn replicate_logs(&self) -> ReplicationResult<u64> {
        let Some(peer) = &self.peer else {
            return Ok(0);
        };
        if !self.ingestor.is_idle() {
            return Ok(0);
        }

        let remote = peer.fetch_bitset().await?;
        let Some(wanted) = self.missing_records(&remote) else {
            return Ok(0);
        };

        let requested = wanted.cardinality();
        tracing::info!(
            event = %Event::LogFetchRequested,
            peer = peer.base_url(),
            records = requested,
            ranges = wanted.interval_count(),
            "requesting missing log records"
        );

        let body = peer.fetch_records(&wanted).await?;
        if body.trim().is_empty() {
            return Ok(requested);
        }

        let spool_dir = &self.ingestor.config().spool_dir;
        spool::write_batch(spool_dir, FETCHED_PREFIX, body.as_bytes())
            .map_err(|e| ReplicationError::spool(format!("{}: {}", spool_dir.display(), e)))?;
        Ok(requested)
    }

    /// One role tick: refresh the role, then replicate if STANDBY.
    pub async fn tick(&self) -> PodRole {
        let monitor = Arc::clone(&self.monitor);
        let role = match tokio::task::spawn_blocking(move || monitor.refresh()).await {
            Ok(role) => role,
            Err(e) => {
                tracing::error!(error = %e, "role detection panicked");
                PodRole::Unknown
            }
        };

        if !role.is_standby() {
            return role;
        }

        // Failures are already logged and re-armed.
        let _ = self.sync_if_due().await;

        match self.replicate_logs().await {
            Err(e) if e.is_transient() => {
                tracing::warn!(event = %Event::LogFetchFailed, error = %e, "log replication failed; retrying next tick");
            }
            Err(e) => {
                tracing::error!(
                    event = %Event::LogFetchFailed,
                    kind = ?e.kind,
                    error = %e,
                    "log replication failed on this POD"
                );
            }
            Ok(_) => {}
        }
        role
    }

    /// Tick until `shutdown` flips to true.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.monitor.config().tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
            self.tick().await;
        }
    }
}
