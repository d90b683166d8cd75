//! POD service wiring
//!
//! Constructs every component exactly once and owns their lifecycle:
//!
//! 1. Stores, allocator and ingestor (bitset seeded from the store)
//! 2. Role monitor, change notifier, replication coordinator
//! 3. `start`: spool dir, HTTP listener, then the three loops
//! 4. `PodHandle::shutdown`: signal every loop and wait for it

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::http_server::{HttpServer, InternalState};
use crate::logs::{
    IngestConfig, LogIngestor, LogRecordStore, LogStoreError, MemoryLogStore, RecordIdAllocator,
};
use crate::notify::{ChangeNotifier, Clock, SystemClock};
use crate::observability::Event;
use crate::provisioning::{MemoryProvisioningStore, ProvisioningStore};
use crate::replication::{
    build_http_client, NameResolver, PeerClient, ReplicationCoordinator, ReplicationError,
    RoleMonitor, SystemResolver,
};

/// Startup failures
#[derive(Debug, Error)]
pub enum PodError {
    #[error("log store: {0}")]
    LogStore(#[from] LogStoreError),

    #[error("replication: {0}")]
    Replication(#[from] ReplicationError),

    #[error("spool directory {path}: {source}")]
    Spool {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP listener {addr}: {source}")]
    Listen {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

pub type PodResult<T> = Result<T, PodError>;

/// External collaborators a POD is built over
pub struct PodParts {
    pub provisioning: Arc<dyn ProvisioningStore>,
    pub log_store: Arc<dyn LogRecordStore>,
    pub resolver: Arc<dyn NameResolver>,
    pub clock: Arc<dyn Clock>,
}

impl Default for PodParts {
    fn default() -> Self {
        Self {
            provisioning: Arc::new(MemoryProvisioningStore::new()),
            log_store: Arc::new(MemoryLogStore::new()),
            resolver: Arc::new(SystemResolver),
            clock: Arc::new(SystemClock),
        }
    }
}

/// One fully wired POD
pub struct Pod {
    config: Config,
    provisioning: Arc<dyn ProvisioningStore>,
    ingestor: Arc<LogIngestor>,
    monitor: Arc<RoleMonitor>,
    notifier: Arc<ChangeNotifier>,
    coordinator: Arc<ReplicationCoordinator>,
}

impl Pod {
    /// Build over in-memory stores, system DNS and the system clock.
    pub fn build(config: Config) -> PodResult<Self> {
        Self::with_parts(config, PodParts::default())
    }

    /// Build over the given collaborators.
    pub fn with_parts(config: Config, parts: PodParts) -> PodResult<Self> {
        let band = config.band();
        let allocator = RecordIdAllocator::resume(band, parts.log_store.as_ref())?;
        tracing::info!(band = %band, next_id = allocator.peek(), "record id allocator resumed");

        let ingest_config: IngestConfig = config.ingest_config();
        let ingestor = Arc::new(LogIngestor::new(
            ingest_config,
            Arc::clone(&parts.log_store),
            allocator,
        )?);

        let replication = config.replication_config();
        let http = build_http_client(replication.connect_timeout, replication.request_timeout)?;
        let peer = replication
            .peer_base_url()
            .map(|url| PeerClient::new(http.clone(), url));

        let monitor = Arc::new(RoleMonitor::new(replication, parts.resolver));
        let notifier = Arc::new(ChangeNotifier::new(
            config.notifier_config(),
            parts.clock,
            Arc::clone(&parts.provisioning),
            Arc::clone(&monitor),
            http,
        ));
        let coordinator = Arc::new(ReplicationCoordinator::new(
            Arc::clone(&monitor),
            Arc::clone(&parts.provisioning),
            Arc::clone(&ingestor),
            Arc::clone(&notifier),
            peer,
        ));

        Ok(Self {
            config,
            provisioning: parts.provisioning,
            ingestor,
            monitor,
            notifier,
            coordinator,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn provisioning(&self) -> &Arc<dyn ProvisioningStore> {
        &self.provisioning
    }

    pub fn ingestor(&self) -> &Arc<LogIngestor> {
        &self.ingestor
    }

    pub fn monitor(&self) -> &Arc<RoleMonitor> {
        &self.monitor
    }

    pub fn notifier(&self) -> &Arc<ChangeNotifier> {
        &self.notifier
    }

    pub fn coordinator(&self) -> &Arc<ReplicationCoordinator> {
        &self.coordinator
    }

    fn internal_state(&self) -> Arc<InternalState> {
        Arc::new(InternalState {
            coordinator: Arc::clone(&self.coordinator),
            notifier: Arc::clone(&self.notifier),
            ingestor: Arc::clone(&self.ingestor),
        })
    }

    /// Router for the internal endpoints of this POD.
    pub fn router(&self) -> Router {
        HttpServer::build_router(self.internal_state())
    }

    /// Bind the listener and start every background loop.
    pub async fn start(self) -> PodResult<PodHandle> {
        let spool_dir = &self.config.spool_dir;
        std::fs::create_dir_all(spool_dir).map_err(|source| PodError::Spool {
            path: spool_dir.display().to_string(),
            source,
        })?;

        let server = HttpServer::new(self.config.http.clone(), self.internal_state());
        let addr = server.socket_addr();
        let listener = server
            .bind()
            .await
            .map_err(|source| PodError::Listen { addr: addr.clone(), source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| PodError::Listen { addr, source })?;

        // A fresh ACTIVE POD announces itself once.
        self.notifier.provisioning_data_changed();

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut tasks = Vec::new();

        tasks.push(tokio::spawn(
            Arc::clone(&self.ingestor).run(shutdown_rx.clone()),
        ));
        tasks.push(tokio::spawn(
            Arc::clone(&self.coordinator).run(shutdown_rx.clone()),
        ));
        tasks.push(tokio::spawn(
            Arc::clone(&self.notifier).run(shutdown_rx.clone()),
        ));

        let router = server.router();
        let server_shutdown = shutdown_rx.clone();
        tasks.push(tokio::spawn(async move {
            if let Err(e) = HttpServer::serve(listener, router, server_shutdown).await {
                tracing::error!(error = %e, "internal HTTP server stopped");
            }
        }));

        tracing::info!(
            event = %Event::BootComplete,
            this_pod = %self.config.this_pod,
            addr = %local_addr,
            "POD started"
        );

        Ok(PodHandle {
            pod: self,
            local_addr,
            shutdown: shutdown_tx,
            tasks,
        })
    }
}

/// Running POD
pub struct PodHandle {
    pod: Pod,
    local_addr: SocketAddr,
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl PodHandle {
    pub fn pod(&self) -> &Pod {
        &self.pod
    }

    /// Address the internal endpoints are bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop every loop and wait for them to finish.
    pub async fn shutdown(self) {
        tracing::info!(event = %Event::ShutdownStart, "POD shutting down");
        let _ = self.shutdown.send(true);
        for task in self.tasks {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "background task failed during shutdown");
            }
        }
        tracing::info!(event = %Event::ShutdownComplete, "POD stopped");
    }
}
