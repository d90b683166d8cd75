//! Observability events for provsync
//!
//! Every lifecycle event the daemon emits is listed here so that log
//! consumers can rely on a closed set of `event` field values.

use std::fmt;

/// Observable events in provsync
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Boot & Lifecycle
    /// Daemon startup begins
    BootStart,
    /// All components constructed and loops started
    BootComplete,
    /// Shutdown initiated
    ShutdownStart,
    /// Shutdown complete
    ShutdownComplete,
    /// Configuration loaded
    ConfigLoaded,
    /// Internal HTTP endpoints serving
    Serving,

    // Role detection
    /// Detected POD role changed
    RoleTransition,
    /// Role could not be determined
    RoleUnknown,

    // Provisioning sync
    /// Snapshot pull from peer begins
    SyncStart,
    /// Snapshot diff applied
    SyncComplete,
    /// Snapshot pull aborted
    SyncFailed,
    /// A single entity write failed during sync
    EntityApplyFailed,
    /// Publisher or subscriber of an entity changed
    OwnershipTransferred,

    // Log replication
    /// Missing log records requested from peer
    LogFetchRequested,
    /// Log replication step failed
    LogFetchFailed,

    // Log ingestion
    /// One spool pass finished
    IngestPassComplete,
    /// Malformed log line skipped
    IngestLineRejected,
    /// Spool file could not be read
    IngestFileRejected,
    /// Log record write failed
    IngestStoreFailed,
    /// Retention prune finished
    PruneComplete,

    // Change notification
    /// Provisioning snapshot document rebuilt
    SnapshotRebuilt,
    /// Refresh push delivered
    PokeSent,
    /// Refresh push failed
    PokeFailed,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::BootStart => "PROVSYNC_STARTUP_BEGIN",
            Event::BootComplete => "PROVSYNC_STARTUP_COMPLETE",
            Event::ShutdownStart => "SHUTDOWN_START",
            Event::ShutdownComplete => "SHUTDOWN_COMPLETE",
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::Serving => "PROVSYNC_SERVING",

            Event::RoleTransition => "ROLE_TRANSITION",
            Event::RoleUnknown => "ROLE_UNKNOWN",

            Event::SyncStart => "SYNC_BEGIN",
            Event::SyncComplete => "SYNC_COMPLETE",
            Event::SyncFailed => "SYNC_FAILED",
            Event::EntityApplyFailed => "ENTITY_APPLY_FAILED",
            Event::OwnershipTransferred => "OWNERSHIP_TRANSFERRED",

            Event::LogFetchRequested => "LOG_FETCH_REQUESTED",
            Event::LogFetchFailed => "LOG_FETCH_FAILED",

            Event::IngestPassComplete => "INGEST_PASS_COMPLETE",
            Event::IngestLineRejected => "INGEST_LINE_REJECTED",
            Event::IngestFileRejected => "INGEST_FILE_REJECTED",
            Event::IngestStoreFailed => "INGEST_STORE_FAILED",
            Event::PruneComplete => "PRUNE_COMPLETE",

            Event::SnapshotRebuilt => "SNAPSHOT_REBUILT",
            Event::PokeSent => "POKE_SENT",
            Event::PokeFailed => "POKE_FAILED",
        }
    }

    /// Returns true if this event reports a failed operation.
    ///
    /// Failures are never fatal; the next tick retries.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Event::RoleUnknown
                | Event::SyncFailed
                | Event::EntityApplyFailed
                | Event::LogFetchFailed
                | Event::IngestLineRejected
                | Event::IngestFileRejected
                | Event::IngestStoreFailed
                | Event::PokeFailed
        )
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
