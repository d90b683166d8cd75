//! Change Notifier Tests
//!
//! - Soft deadline extends on every mark; hard deadline caps latency
//! - A burst of marks produces exactly one fire
//! - Only the ACTIVE POD pokes
//! - One unreachable target does not block the rest

use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, http::StatusCode, routing::get, Router};
use provsync::notify::{ChangeNotifier, Clock, ManualClock, NotifierConfig};
use provsync::provisioning::{MemoryProvisioningStore, Parameter, ProvisioningStore};
use provsync::replication::{ReplicationConfig, RoleMonitor, StaticResolver, FETCH_PROV_PATH};

const SOFT_MS: u64 = 5_000;
const HARD_MS: u64 = 30_000;

struct Harness {
    clock: Arc<ManualClock>,
    store: Arc<MemoryProvisioningStore>,
    resolver: Arc<StaticResolver>,
    monitor: Arc<RoleMonitor>,
    notifier: ChangeNotifier,
}

fn ip(text: &str) -> IpAddr {
    text.parse().unwrap()
}

fn harness(config: NotifierConfig) -> Harness {
    let clock = Arc::new(ManualClock::new(1_000_000));
    let store = Arc::new(MemoryProvisioningStore::new());
    let resolver = Arc::new(StaticResolver::new());
    resolver.set("pod-a", vec![ip("10.0.0.1")]);
    resolver.set("prov", vec![ip("10.0.0.1")]);

    let replication = ReplicationConfig::new(
        "pod-a",
        vec!["pod-a".to_string(), "pod-b".to_string()],
        "prov",
    );
    let monitor = Arc::new(RoleMonitor::new(replication, resolver.clone()));
    let notifier = ChangeNotifier::new(
        config,
        clock.clone(),
        store.clone(),
        monitor.clone(),
        reqwest::Client::new(),
    );
    Harness {
        clock,
        store,
        resolver,
        monitor,
        notifier,
    }
}

fn default_config() -> NotifierConfig {
    NotifierConfig {
        soft_delay: Duration::from_millis(SOFT_MS),
        hard_delay: Duration::from_millis(HARD_MS),
        ..NotifierConfig::default()
    }
}

// =============================================================================
// Debounce
// =============================================================================

#[test]
fn test_marks_inside_soft_window_delay_fire() {
    let h = harness(default_config());

    h.notifier.provisioning_data_changed();
    for _ in 0..3 {
        h.clock.advance(SOFT_MS - 1_000);
        assert!(h.notifier.poll().is_none());
        h.notifier.provisioning_data_changed();
    }

    // Soft deadline keeps moving; only the quiet period lets it fire.
    h.clock.advance(SOFT_MS - 1);
    assert!(h.notifier.poll().is_none());
    h.clock.advance(1);
    assert!(h.notifier.poll().is_some());
    assert_eq!(h.notifier.cycle_count(), 1);
}

#[test]
fn test_hard_deadline_caps_continuous_changes() {
    let h = harness(default_config());
    let start = 1_000_000;

    h.notifier.provisioning_data_changed();
    let mut fired_at = None;
    while fired_at.is_none() {
        h.clock.advance(1_000);
        h.notifier.provisioning_data_changed();
        if h.notifier.poll().is_some() {
            fired_at = Some(h.clock.now_millis());
        }
        assert!(h.clock.now_millis() <= start + HARD_MS, "fire later than hard deadline");
    }

    assert_eq!(fired_at, Some(start + HARD_MS));
}

#[test]
fn test_burst_of_marks_fires_once() {
    let h = harness(default_config());

    for _ in 0..100 {
        h.notifier.provisioning_data_changed();
    }
    assert_eq!(h.notifier.signal_count(), 100);

    h.clock.advance(SOFT_MS);
    assert!(h.notifier.poll().is_some());
    for _ in 0..10 {
        h.clock.advance(HARD_MS);
        assert!(h.notifier.poll().is_none());
    }
    assert_eq!(h.notifier.cycle_count(), 1);
    assert!(!h.notifier.timers().is_pending());
}

#[test]
fn test_fire_rebuilds_snapshot_document() {
    let h = harness(default_config());
    let before = h.notifier.snapshot_document();

    h.store
        .insert(
            &Parameter {
                name: "NODES".into(),
                value: "n1".into(),
            }
            .into(),
        )
        .unwrap();
    h.notifier.provisioning_data_changed();
    h.clock.advance(SOFT_MS);

    let cycle = h.notifier.poll().unwrap();
    assert_ne!(*cycle.snapshot, *before);
    assert!(cycle.snapshot.contains("n1"));
    assert_eq!(h.notifier.snapshot_document(), cycle.snapshot);
}

// =============================================================================
// Targets
// =============================================================================

#[test]
fn test_not_active_fires_without_targets() {
    let h = harness(NotifierConfig {
        fallback_nodes: vec!["n1".into()],
        peer_base_url: Some("https://pod-b:8443".into()),
        ..default_config()
    });
    h.resolver.set("prov", vec![ip("10.0.0.2")]);
    h.monitor.refresh();

    h.notifier.provisioning_data_changed();
    h.clock.advance(SOFT_MS);
    let cycle = h.notifier.poll().unwrap();
    assert!(cycle.targets.is_empty());
}

#[test]
fn test_active_targets_nodes_then_peer() {
    let h = harness(NotifierConfig {
        fallback_nodes: vec!["fallback".into()],
        node_scheme: "https".into(),
        peer_base_url: Some("https://pod-b:8443".into()),
        ..default_config()
    });
    h.store
        .insert(
            &Parameter {
                name: "NODES".into(),
                value: "n1| n2 |".into(),
            }
            .into(),
        )
        .unwrap();
    h.monitor.refresh();

    h.notifier.provisioning_data_changed();
    h.clock.advance(SOFT_MS);
    let cycle = h.notifier.poll().unwrap();
    assert_eq!(
        cycle.targets,
        vec![
            format!("https://n1{}", FETCH_PROV_PATH),
            format!("https://n2{}", FETCH_PROV_PATH),
            format!("https://pod-b:8443{}", FETCH_PROV_PATH),
        ]
    );
}

#[test]
fn test_fallback_nodes_when_parameter_missing() {
    let h = harness(NotifierConfig {
        fallback_nodes: vec!["fallback:8443".into()],
        ..default_config()
    });
    h.monitor.refresh();

    assert_eq!(
        h.notifier.poke_targets(),
        vec![format!("https://fallback:8443{}", FETCH_PROV_PATH)]
    );
}

// =============================================================================
// Push
// =============================================================================

async fn counting_node() -> (String, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let app = Router::new()
        .route(
            FETCH_PROV_PATH,
            get(|State(hits): State<Arc<AtomicUsize>>| async move {
                hits.fetch_add(1, Ordering::SeqCst);
                StatusCode::NO_CONTENT
            }),
        )
        .with_state(hits.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr.to_string(), hits)
}

#[tokio::test]
async fn test_unreachable_target_does_not_block_others() {
    let (node, hits) = counting_node().await;
    let h = harness(NotifierConfig {
        node_scheme: "http".into(),
        ..default_config()
    });
    h.store
        .insert(
            &Parameter {
                name: "NODES".into(),
                value: format!("127.0.0.1:1|{}", node),
            }
            .into(),
        )
        .unwrap();
    h.monitor.refresh();

    h.notifier.provisioning_data_changed();
    h.clock.advance(SOFT_MS);
    let cycle = h.notifier.poll().unwrap();
    assert_eq!(cycle.targets.len(), 2);

    let sent = h.notifier.push(&cycle).await;
    assert_eq!(sent, 1);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}
