//! Log Ingestor
//!
//! Drains the inbound spool into the log record store and keeps the
//! in-memory bitset of persisted ids current.
//!
//! Per pass:
//! 1. Prune if the store holds more than the retention threshold
//! 2. Ingest every eligible spool file, deleting each once read
//! 3. Repeat until no eligible file is left
//!
//! The bitset is a cache of the store's ids. It is rebuilt at startup
//! and after every prune, and a bit is only set once its record has
//! been persisted, so a failed write is simply "missing" and will be
//! fetched again by log replication.

use std::collections::{BTreeMap, HashSet};
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::NaiveDate;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use super::allocator::RecordIdAllocator;
use super::errors::{IngestResult, LogStoreError, LogStoreResult};
use super::record::LogRecord;
use super::spool;
use super::store::LogRecordStore;
use crate::bitset::RangeBitset;
use crate::observability::Event;

/// Default retention threshold (rows)
pub const DEFAULT_RETENTION_THRESHOLD: u64 = 10_000_000;

/// Default maximum rows deleted by a single prune
pub const DEFAULT_PRUNE_BATCH_LIMIT: u64 = 1_000_000;

/// Ingestor settings
#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub spool_dir: PathBuf,
    pub retention_threshold: u64,
    pub prune_batch_limit: u64,
    pub poll_interval: Duration,
}

impl IngestConfig {
    /// Defaults for everything except the spool directory.
    pub fn new(spool_dir: impl Into<PathBuf>) -> Self {
        Self {
            spool_dir: spool_dir.into(),
            retention_threshold: DEFAULT_RETENTION_THRESHOLD,
            prune_batch_limit: DEFAULT_PRUNE_BATCH_LIMIT,
            poll_interval: Duration::from_secs(1),
        }
    }
}

/// What happened to one log line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineOutcome {
    /// Persisted under this id
    Inserted(u64),
    /// Already persisted under this id; nothing written
    Duplicate(u64),
    /// Line did not parse
    Rejected,
    /// Store write failed
    Failed,
}

/// Counters for one pass or one batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassStats {
    pub files: u64,
    pub inserted: u64,
    pub duplicates: u64,
    pub rejected: u64,
    pub failed: u64,
    pub pruned: u64,
}

impl PassStats {
    fn record(&mut self, outcome: LineOutcome) {
        match outcome {
            LineOutcome::Inserted(_) => self.inserted += 1,
            LineOutcome::Duplicate(_) => self.duplicates += 1,
            LineOutcome::Rejected => self.rejected += 1,
            LineOutcome::Failed => self.failed += 1,
        }
    }

    fn absorb(&mut self, other: PassStats) {
        self.files += other.files;
        self.inserted += other.inserted;
        self.duplicates += other.duplicates;
        self.rejected += other.rejected;
        self.failed += other.failed;
        self.pruned += other.pruned;
    }
}

/// Newest day whose records cannot all be kept under `threshold`.
///
/// Walking days newest to oldest, the cutoff is the first day at which
/// the running total would exceed `threshold`. Every record on or
/// before the cutoff must go; nothing after it is touched.
pub fn cutoff_day(histogram: &BTreeMap<NaiveDate, u64>, threshold: u64) -> Option<NaiveDate> {
    let mut kept: u64 = 0;
    for (day, count) in histogram.iter().rev() {
        if kept.saturating_add(*count) > threshold {
            return Some(*day);
        }
        kept += count;
    }
    None
}

/// Resets the idle flag when a pass ends, however it ends.
struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    fn enter(idle: &'a AtomicBool) -> Self {
        idle.store(false, Ordering::SeqCst);
        Self(idle)
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Spool-to-store ingestion loop
pub struct LogIngestor {
    config: IngestConfig,
    store: Arc<dyn LogRecordStore>,
    allocator: RecordIdAllocator,
    bitset: RwLock<RangeBitset>,
    idle: AtomicBool,
}

impl LogIngestor {
    /// Create an ingestor, seeding the bitset from the store.
    pub fn new(
        config: IngestConfig,
        store: Arc<dyn LogRecordStore>,
        allocator: RecordIdAllocator,
    ) -> LogStoreResult<Self> {
        let bitset = store.id_bitset()?;
        Ok(Self {
            config,
            store,
            allocator,
            bitset: RwLock::new(bitset),
            idle: AtomicBool::new(true),
        })
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn LogRecordStore> {
        &self.store
    }

    pub fn allocator(&self) -> &RecordIdAllocator {
        &self.allocator
    }

    /// False while a pass is in flight.
    pub fn is_idle(&self) -> bool {
        self.idle.load(Ordering::SeqCst)
    }

    /// Copy of the persisted-id bitset.
    pub fn bitset(&self) -> RangeBitset {
        self.bitset
            .read()
            .map(|b| b.clone())
            .unwrap_or_else(|e| e.into_inner().clone())
    }

    /// Whether `id` is known to be persisted.
    pub fn contains(&self, id: u64) -> bool {
        self.bitset
            .read()
            .map(|b| b.get(id))
            .unwrap_or_else(|e| e.into_inner().get(id))
    }

    /// Replace the bitset with a fresh scan of the store.
    pub fn rebuild_bitset(&self) -> LogStoreResult<()> {
        let fresh = self.store.id_bitset()?;
        let mut bitset = self.bitset.write().unwrap_or_else(|e| e.into_inner());
        *bitset = fresh;
        Ok(())
    }

    fn mark_persisted(&self, id: u64) {
        let mut bitset = self.bitset.write().unwrap_or_else(|e| e.into_inner());
        let _ = bitset.set_bit(id);
    }

    /// Parse and persist one line.
    pub fn ingest_line(&self, line: &str) -> LineOutcome {
        if line.trim().is_empty() {
            return LineOutcome::Rejected;
        }
        match LogRecord::parse_line(line) {
            Ok(record) => self.ingest_record(record),
            Err(e) => {
                tracing::warn!(event = %Event::IngestLineRejected, error = %e, line, "skipping malformed log line");
                LineOutcome::Rejected
            }
        }
    }

    /// Persist one parsed record, assigning an id if it has none.
    pub fn ingest_record(&self, mut record: LogRecord) -> LineOutcome {
        let id = match record.record_id {
            Some(id) => {
                if self.contains(id) {
                    tracing::debug!(record_id = id, "duplicate replicated record dropped");
                    return LineOutcome::Duplicate(id);
                }
                id
            }
            None => {
                match self.store.find_event(&record.event_key()) {
                    Ok(Some(existing)) => {
                        tracing::debug!(record_id = existing, "duplicate uploaded record dropped");
                        return LineOutcome::Duplicate(existing);
                    }
                    Ok(None) => {}
                    Err(e) => {
                        tracing::warn!(event = %Event::IngestStoreFailed, error = %e, "event lookup failed");
                        return LineOutcome::Failed;
                    }
                }
                let id = self.allocator.next_id();
                record.record_id = Some(id);
                id
            }
        };

        match self.store.insert(&record) {
            Ok(()) => {
                self.mark_persisted(id);
                LineOutcome::Inserted(id)
            }
            Err(LogStoreError::DuplicateId(id)) => {
                // Stored but missing from the cache, e.g. written by another process.
                self.mark_persisted(id);
                tracing::debug!(record_id = id, "record already in store");
                LineOutcome::Duplicate(id)
            }
            Err(e) => {
                tracing::warn!(event = %Event::IngestStoreFailed, record_id = id, error = %e, "log record write failed");
                LineOutcome::Failed
            }
        }
    }

    /// Ingest every line from `reader`.
    ///
    /// A line that is not valid UTF-8 is rejected like any other
    /// malformed line. Only a read failure aborts the batch.
    pub fn ingest_reader(&self, mut reader: impl BufRead) -> std::io::Result<PassStats> {
        let mut stats = PassStats::default();
        let mut buf = Vec::new();
        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf)? == 0 {
                break;
            }
            let line = match std::str::from_utf8(&buf) {
                Ok(line) => line.trim_end_matches(['\r', '\n']),
                Err(e) => {
                    tracing::warn!(event = %Event::IngestLineRejected, error = %e, "log line is not UTF-8");
                    stats.record(LineOutcome::Rejected);
                    continue;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            stats.record(self.ingest_line(line));
        }
        Ok(stats)
    }

    fn ingest_file(&self, path: &Path) -> std::io::Result<PassStats> {
        let reader = spool::open_batch(path)?;
        let mut stats = self.ingest_reader(reader)?;
        stats.files = 1;
        std::fs::remove_file(path)?;
        Ok(stats)
    }

    /// Delete the oldest days once the store exceeds the retention threshold.
    ///
    /// Returns the number of rows deleted. At most `prune_batch_limit`
    /// rows go per call; anything left over is pruned on a later pass.
    pub fn prune(&self) -> LogStoreResult<u64> {
        let count = self.store.count()?;
        if count <= self.config.retention_threshold {
            return Ok(0);
        }

        let histogram = self.store.day_histogram()?;
        let Some(cutoff) = cutoff_day(&histogram, self.config.retention_threshold) else {
            return Ok(0);
        };

        let deleted = self
            .store
            .delete_through_day(cutoff, self.config.prune_batch_limit)?;
        self.rebuild_bitset()?;

        tracing::info!(
            event = %Event::PruneComplete,
            cutoff = %cutoff,
            deleted,
            before = count,
            "pruned old log records"
        );
        Ok(deleted)
    }

    /// One full pass: prune, then drain the spool.
    pub fn run_pass(&self) -> IngestResult<PassStats> {
        let _busy = BusyGuard::enter(&self.idle);
        let mut stats = PassStats::default();

        match self.prune() {
            Ok(pruned) => stats.pruned = pruned,
            Err(e) => tracing::warn!(event = %Event::IngestStoreFailed, error = %e, "prune failed"),
        }

        let mut seen: HashSet<PathBuf> = HashSet::new();
        loop {
            let pending: Vec<PathBuf> = spool::pending_files(&self.config.spool_dir)?
                .into_iter()
                .filter(|p| !seen.contains(p))
                .collect();
            if pending.is_empty() {
                break;
            }

            for path in pending {
                match self.ingest_file(&path) {
                    Ok(file_stats) => stats.absorb(file_stats),
                    Err(e) => {
                        tracing::warn!(
                            event = %Event::IngestFileRejected,
                            file = %path.display(),
                            error = %e,
                            "spool file unreadable"
                        );
                        if let Err(e) = spool::quarantine(&path) {
                            tracing::warn!(file = %path.display(), error = %e, "quarantine failed");
                        }
                    }
                }
                seen.insert(path);
            }
        }

        Ok(stats)
    }

    /// Poll the spool until `shutdown` flips to true.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.config.poll_interval);
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

            let ingestor = Arc::clone(&self);
            match tokio::task::spawn_blocking(move || ingestor.run_pass()).await {
                Ok(Ok(stats)) if stats.files > 0 || stats.pruned > 0 => {
                    tracing::info!(
                        event = %Event::IngestPassComplete,
                        files = stats.files,
                        inserted = stats.inserted,
                        duplicates = stats.duplicates,
                        rejected = stats.rejected,
                        failed = stats.failed,
                        pruned = stats.pruned,
                        "ingest pass complete"
                    );
                }
                Ok(Ok(_)) => {}
                Ok(Err(e)) => {
                    tracing::warn!(event = %Event::IngestFileRejected, error = %e, "ingest pass failed");
                }
                Err(e) => {
                    tracing::error!(error = %e, "ingest pass panicked");
                }
            }
        }
    }
}
