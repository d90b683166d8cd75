//! Change Notifier
//!
//! Debounces provisioning changes into refresh pushes ("pokes"). Checked
//! once per second: when a deadline has passed, the snapshot document is
//! rebuilt and, on the ACTIVE POD only, every downstream node and then
//! the peer POD is poked in turn. One unreachable target never blocks
//! the others.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use reqwest::Client;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use super::clock::Clock;
use super::timers::PokeTimers;
use crate::observability::Event;
use crate::provisioning::{ProvisioningSnapshot, ProvisioningStore};
use crate::replication::{poke, RoleMonitor, FETCH_PROV_PATH};

/// Provisioning parameter listing downstream nodes, `|` separated
pub const NODES_PARAMETER: &str = "NODES";

/// Default quiet period before a poke
pub const DEFAULT_SOFT_DELAY: Duration = Duration::from_secs(5);

/// Default upper bound on poke latency
pub const DEFAULT_HARD_DELAY: Duration = Duration::from_secs(30);

/// Notifier settings
#[derive(Debug, Clone)]
pub struct NotifierConfig {
    pub soft_delay: Duration,
    pub hard_delay: Duration,
    /// Nodes poked when the `NODES` parameter is absent or empty
    pub fallback_nodes: Vec<String>,
    /// Scheme used to reach downstream nodes
    pub node_scheme: String,
    /// Base URL of the peer POD, if any
    pub peer_base_url: Option<String>,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            soft_delay: DEFAULT_SOFT_DELAY,
            hard_delay: DEFAULT_HARD_DELAY,
            fallback_nodes: Vec::new(),
            node_scheme: "https".to_string(),
            peer_base_url: None,
        }
    }
}

/// Work produced by one fire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PokeCycle {
    /// The rebuilt snapshot document
    pub snapshot: Arc<String>,
    /// Refresh URLs in push order; empty unless ACTIVE
    pub targets: Vec<String>,
}

/// Debounced snapshot rebuild and refresh push
pub struct ChangeNotifier {
    config: NotifierConfig,
    clock: Arc<dyn Clock>,
    store: Arc<dyn ProvisioningStore>,
    monitor: Arc<RoleMonitor>,
    http: Client,
    timers: Mutex<PokeTimers>,
    snapshot: RwLock<Arc<String>>,
    signals: AtomicU64,
    cycles: AtomicU64,
}

impl ChangeNotifier {
    /// Create a notifier, building the initial snapshot document.
    pub fn new(
        config: NotifierConfig,
        clock: Arc<dyn Clock>,
        store: Arc<dyn ProvisioningStore>,
        monitor: Arc<RoleMonitor>,
        http: Client,
    ) -> Self {
        let snapshot = render_snapshot(store.as_ref()).unwrap_or_else(empty_snapshot);
        Self {
            config,
            clock,
            store,
            monitor,
            http,
            timers: Mutex::new(PokeTimers::new()),
            snapshot: RwLock::new(Arc::new(snapshot)),
            signals: AtomicU64::new(0),
            cycles: AtomicU64::new(0),
        }
    }

    /// Record a change with explicit deadlines.
    pub fn mark_changed(&self, soft_deadline: u64, hard_deadline: u64) {
        let mut timers = self.timers.lock().unwrap_or_else(|e| e.into_inner());
        timers.mark(soft_deadline, hard_deadline);
    }

    /// Record a change using the configured delays.
    pub fn provisioning_data_changed(&self) {
        let now = self.clock.now_millis();
        self.signals.fetch_add(1, Ordering::SeqCst);
        self.mark_changed(
            now.saturating_add(duration_millis(self.config.soft_delay)),
            now.saturating_add(duration_millis(self.config.hard_delay)),
        );
    }

    /// Current deadlines
    pub fn timers(&self) -> PokeTimers {
        *self.timers.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Number of change signals received
    pub fn signal_count(&self) -> u64 {
        self.signals.load(Ordering::SeqCst)
    }

    /// Number of fires so far
    pub fn cycle_count(&self) -> u64 {
        self.cycles.load(Ordering::SeqCst)
    }

    /// The snapshot document served to the peer.
    pub fn snapshot_document(&self) -> Arc<String> {
        let snapshot = self.snapshot.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&snapshot)
    }

    /// Fire if a deadline has passed.
    ///
    /// Clears both deadlines, rebuilds the snapshot document, and returns
    /// the targets to poke. Returns `None` when nothing is due.
    pub fn poll(&self) -> Option<PokeCycle> {
        let now = self.clock.now_millis();
        {
            let mut timers = self.timers.lock().unwrap_or_else(|e| e.into_inner());
            if !timers.take_if_due(now) {
                return None;
            }
        }
        self.cycles.fetch_add(1, Ordering::SeqCst);

        let snapshot = self.rebuild_snapshot();
        let targets = if self.monitor.current().is_active() {
            self.poke_targets()
        } else {
            Vec::new()
        };
        Some(PokeCycle { snapshot, targets })
    }

    fn rebuild_snapshot(&self) -> Arc<String> {
        match render_snapshot(self.store.as_ref()) {
            Some(text) => {
                let text = Arc::new(text);
                let mut snapshot = self.snapshot.write().unwrap_or_else(|e| e.into_inner());
                *snapshot = Arc::clone(&text);
                tracing::info!(event = %Event::SnapshotRebuilt, bytes = text.len(), "snapshot rebuilt");
                text
            }
            // Keep serving the previous document
            None => self.snapshot_document(),
        }
    }

    /// Downstream nodes then the peer POD, as refresh URLs.
    pub fn poke_targets(&self) -> Vec<String> {
        let mut targets: Vec<String> = self
            .downstream_nodes()
            .into_iter()
            .map(|node| format!("{}://{}{}", self.config.node_scheme, node, FETCH_PROV_PATH))
            .collect();
        if let Some(peer) = &self.config.peer_base_url {
            targets.push(format!("{}{}", peer.trim_end_matches('/'), FETCH_PROV_PATH));
        }
        targets
    }

    fn downstream_nodes(&self) -> Vec<String> {
        let listed = match self.store.parameter(NODES_PARAMETER) {
            Ok(value) => value.map(|v| split_nodes(&v)).unwrap_or_default(),
            Err(e) => {
                tracing::warn!(error = %e, "cannot read NODES parameter; using configured nodes");
                Vec::new()
            }
        };
        if listed.is_empty() {
            self.config.fallback_nodes.clone()
        } else {
            listed
        }
    }

    /// Poke every target in order. Returns how many succeeded.
    pub async fn push(&self, cycle: &PokeCycle) -> usize {
        let mut sent = 0;
        for target in &cycle.targets {
            match poke(&self.http, target).await {
                Ok(()) => {
                    sent += 1;
                    tracing::info!(event = %Event::PokeSent, target = %target, "refresh push sent");
                }
                Err(e) => {
                    tracing::warn!(event = %Event::PokeFailed, target = %target, error = %e, "refresh push failed");
                }
            }
        }
        sent
    }

    /// Check the deadlines every second until `shutdown` flips to true.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(Duration::from_secs(1));
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

            if !self.timers().is_due(self.clock.now_millis()) {
                continue;
            }
            let notifier = Arc::clone(&self);
            match tokio::task::spawn_blocking(move || notifier.poll()).await {
                Ok(Some(cycle)) => {
                    self.push(&cycle).await;
                }
                Ok(None) => {}
                Err(e) => tracing::error!(error = %e, "snapshot rebuild panicked"),
            }
        }
    }
}

fn render_snapshot(store: &dyn ProvisioningStore) -> Option<String> {
    let result = ProvisioningSnapshot::from_store(store)
        .map_err(|e| e.to_string())
        .and_then(|s| s.to_json().map_err(|e| e.to_string()));
    match result {
        Ok(text) => Some(text),
        Err(e) => {
            tracing::warn!(error = %e, "snapshot rebuild failed");
            None
        }
    }
}

fn empty_snapshot() -> String {
    ProvisioningSnapshot::new().to_json().unwrap_or_else(|_| "{}".to_string())
}

fn split_nodes(value: &str) -> Vec<String> {
    value
        .split('|')
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(String::from)
        .collect()
}

fn duration_millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
