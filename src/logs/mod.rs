//! Log Records and Ingestion
//!
//! - Typed log records and the pipe-delimited line formats
//! - Band-partitioned record id allocation
//! - The store seam for persisted records
//! - The spool directory and the ingestion loop draining it

mod allocator;
mod errors;
mod ingestor;
mod record;
mod store;

pub mod spool;

pub use allocator::{Band, RecordIdAllocator, BAND_SIZE};
pub use errors::{IngestError, IngestResult, LogParseError, LogStoreError, LogStoreResult};
pub use ingestor::{
    cutoff_day, IngestConfig, LineOutcome, LogIngestor, PassStats, DEFAULT_PRUNE_BATCH_LIMIT,
    DEFAULT_RETENTION_THRESHOLD,
};
pub use record::{EventKey, LogRecord, RecordType, FULL_LOG_TAG};
pub use store::{LogRecordStore, MemoryLogStore};
