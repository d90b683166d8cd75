//! Log Record Store
//!
//! Persistence seam for log records. The relational backend lives
//! outside this crate; [`MemoryLogStore`] is the reference implementation.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use chrono::NaiveDate;

use super::errors::{LogStoreError, LogStoreResult};
use super::record::{EventKey, LogRecord};
use crate::bitset::RangeBitset;

/// Storage operations the ingestor and the replication endpoints need.
pub trait LogRecordStore: Send + Sync {
    /// Persist a record. `record.record_id` must be set.
    fn insert(&self, record: &LogRecord) -> LogStoreResult<()>;

    /// Number of stored records.
    fn count(&self) -> LogStoreResult<u64>;

    /// Every stored record id.
    fn id_bitset(&self) -> LogStoreResult<RangeBitset>;

    /// Highest stored id in `[start, end)`.
    fn max_id_in(&self, start: u64, end: u64) -> LogStoreResult<Option<u64>>;

    /// Id of an already stored record describing the same event.
    fn find_event(&self, key: &EventKey) -> LogStoreResult<Option<u64>>;

    /// Record count per UTC event day.
    fn day_histogram(&self) -> LogStoreResult<BTreeMap<NaiveDate, u64>>;

    /// Delete records whose event day is on or before `cutoff`, oldest
    /// first, at most `limit` of them. Returns how many were deleted.
    fn delete_through_day(&self, cutoff: NaiveDate, limit: u64) -> LogStoreResult<u64>;

    /// Records whose id is set in `wanted`, ascending by id.
    fn fetch(&self, wanted: &RangeBitset) -> LogStoreResult<Vec<LogRecord>>;
}

#[derive(Debug, Default)]
struct Tables {
    records: BTreeMap<u64, LogRecord>,
    by_event: HashMap<EventKey, u64>,
}

/// In-memory log record store
#[derive(Debug, Default)]
pub struct MemoryLogStore {
    tables: RwLock<Tables>,
}

impl MemoryLogStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Get one record by id
    pub fn get(&self, id: u64) -> Option<LogRecord> {
        self.tables
            .read()
            .ok()
            .and_then(|t| t.records.get(&id).cloned())
    }

    fn lock_err() -> LogStoreError {
        LogStoreError::Backend("Lock poisoned".into())
    }
}

impl LogRecordStore for MemoryLogStore {
    fn insert(&self, record: &LogRecord) -> LogStoreResult<()> {
        let id = record.record_id.ok_or(LogStoreError::MissingId)?;
        let mut tables = self.tables.write().map_err(|_| Self::lock_err())?;
        if tables.records.contains_key(&id) {
            return Err(LogStoreError::DuplicateId(id));
        }
        tables.by_event.entry(record.event_key()).or_insert(id);
        tables.records.insert(id, record.clone());
        Ok(())
    }

    fn count(&self) -> LogStoreResult<u64> {
        let tables = self.tables.read().map_err(|_| Self::lock_err())?;
        Ok(tables.records.len() as u64)
    }

    fn id_bitset(&self) -> LogStoreResult<RangeBitset> {
        let tables = self.tables.read().map_err(|_| Self::lock_err())?;
        Ok(tables.records.keys().copied().collect())
    }

    fn max_id_in(&self, start: u64, end: u64) -> LogStoreResult<Option<u64>> {
        if start >= end {
            return Ok(None);
        }
        let tables = self.tables.read().map_err(|_| Self::lock_err())?;
        Ok(tables.records.range(start..end).next_back().map(|(&id, _)| id))
    }

    fn find_event(&self, key: &EventKey) -> LogStoreResult<Option<u64>> {
        let tables = self.tables.read().map_err(|_| Self::lock_err())?;
        Ok(tables.by_event.get(key).copied())
    }

    fn day_histogram(&self) -> LogStoreResult<BTreeMap<NaiveDate, u64>> {
        let tables = self.tables.read().map_err(|_| Self::lock_err())?;
        let mut histogram = BTreeMap::new();
        for record in tables.records.values() {
            *histogram.entry(record.day()).or_insert(0) += 1;
        }
        Ok(histogram)
    }

    fn delete_through_day(&self, cutoff: NaiveDate, limit: u64) -> LogStoreResult<u64> {
        let mut tables = self.tables.write().map_err(|_| Self::lock_err())?;

        let mut victims: Vec<(chrono::DateTime<chrono::Utc>, u64)> = tables
            .records
            .iter()
            .filter(|(_, r)| r.day() <= cutoff)
            .map(|(&id, r)| (r.event_time, id))
            .collect();
        victims.sort_unstable();
        victims.truncate(usize::try_from(limit).unwrap_or(usize::MAX));

        for (_, id) in &victims {
            if let Some(record) = tables.records.remove(id) {
                let key = record.event_key();
                if tables.by_event.get(&key) == Some(id) {
                    tables.by_event.remove(&key);
                }
            }
        }

        Ok(victims.len() as u64)
    }

    fn fetch(&self, wanted: &RangeBitset) -> LogStoreResult<Vec<LogRecord>> {
        let tables = self.tables.read().map_err(|_| Self::lock_err())?;
        let mut found = Vec::new();
        for (start, end) in wanted.intervals() {
            found.extend(tables.records.range(start..end).map(|(_, r)| r.clone()));
        }
        Ok(found)
    }
}
