//! Log Ingestion Tests
//!
//! - Duplicate suppression for uploaded and replicated lines
//! - Retention pruning by day
//! - Spool handling: gzip, partial files, unreadable files

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use flate2::write::GzEncoder;
use flate2::Compression;
use provsync::logs::{
    spool, Band, IngestConfig, LineOutcome, LogIngestor, LogRecord, LogRecordStore, MemoryLogStore,
    RecordIdAllocator, RecordType,
};
use tempfile::TempDir;

const PUB_LINE: &str =
    "2024-03-01T10:15:30.123Z|PUB|p1|42|/publish/42/f|PUT|text/csv|10|10.0.0.5|alice|204";
const DEL_LINE: &str =
    "2024-03-01T10:15:31.000Z|DEL|p1|42|7|https://sink/7/f|PUT|text/csv|10|bob|204|";

fn ingestor_with(store: Arc<MemoryLogStore>, config: IngestConfig) -> LogIngestor {
    let allocator = RecordIdAllocator::resume(Band::InitialActive, store.as_ref()).unwrap();
    LogIngestor::new(config, store, allocator).unwrap()
}

fn ingestor(dir: &Path) -> (LogIngestor, Arc<MemoryLogStore>) {
    let store = Arc::new(MemoryLogStore::new());
    let ing = ingestor_with(store.clone(), IngestConfig::new(dir));
    (ing, store)
}

// =============================================================================
// Duplicates
// =============================================================================

#[test]
fn test_same_line_twice_persists_once() {
    let dir = TempDir::new().unwrap();
    let (ing, store) = ingestor(dir.path());

    let first = ing.ingest_line(PUB_LINE);
    let second = ing.ingest_line(PUB_LINE);

    assert!(matches!(first, LineOutcome::Inserted(_)));
    assert!(matches!(second, LineOutcome::Duplicate(_)));
    assert_eq!(store.count().unwrap(), 1);
}

#[test]
fn test_replicated_batch_applied_twice_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let (ing, store) = ingestor(dir.path());

    let base = Band::InitialStandby.start();
    let batch: String = [PUB_LINE, DEL_LINE]
        .iter()
        .enumerate()
        .map(|(i, line)| {
            let record = LogRecord::parse_line(line).unwrap().with_id(base + i as u64);
            format!("{}\n", record.to_log_line())
        })
        .collect();

    let first = ing.ingest_reader(batch.as_bytes()).unwrap();
    let second = ing.ingest_reader(batch.as_bytes()).unwrap();

    assert_eq!(first.inserted, 2);
    assert_eq!(second.inserted, 0);
    assert_eq!(second.duplicates, 2);
    assert_eq!(store.count().unwrap(), 2);
    assert_eq!(ing.bitset().to_string(), format!("{}-{}", base, base + 1));
}

#[test]
fn test_malformed_lines_do_not_stop_batch() {
    let dir = TempDir::new().unwrap();
    let (ing, store) = ingestor(dir.path());

    let batch = format!("{}\ngarbage\n2024-13-01T00:00:00Z|PUB|x\n{}\n", PUB_LINE, DEL_LINE);
    let stats = ing.ingest_reader(batch.as_bytes()).unwrap();

    assert_eq!(stats.inserted, 2);
    assert_eq!(stats.rejected, 2);
    assert_eq!(store.count().unwrap(), 2);

    // A line that is not UTF-8 is rejected without ending the batch.
    let mut bytes = b"2024-03-01T10:15:32.000Z|PUB|p9|42|/x\xff|PUT|text/csv|1|10.0.0.5|alice|204\n".to_vec();
    bytes.extend_from_slice(b"2024-03-01T10:15:33.000Z|PUB|p10|42|/publish/42/g|PUT|text/csv|1|10.0.0.5|alice|204\n");
    let stats = ing.ingest_reader(bytes.as_slice()).unwrap();

    assert_eq!(stats.rejected, 1);
    assert_eq!(stats.inserted, 1);
    assert_eq!(store.count().unwrap(), 3);
}

// =============================================================================
// Retention
// =============================================================================

fn seed_days(store: &MemoryLogStore, per_day: &[u64]) {
    let day0 = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
    let mut id = 0;
    for (d, count) in per_day.iter().enumerate() {
        for n in 0..*count {
            let at = day0 + Duration::days(d as i64) + Duration::seconds(n as i64);
            let record = LogRecord::new(at, RecordType::Publish, format!("p{}", id), 1).with_id(id);
            store.insert(&record).unwrap();
            id += 1;
        }
    }
}

#[test]
fn test_prune_under_threshold_is_noop() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(MemoryLogStore::new());
    seed_days(&store, &[5, 5, 5]);

    let config = IngestConfig {
        retention_threshold: 15,
        ..IngestConfig::new(dir.path())
    };
    let ing = ingestor_with(store.clone(), config);

    assert_eq!(ing.prune().unwrap(), 0);
    assert_eq!(store.count().unwrap(), 15);
}

#[test]
fn test_prune_over_threshold_keeps_newest_days() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(MemoryLogStore::new());
    seed_days(&store, &[4, 4, 4, 4]);

    let config = IngestConfig {
        retention_threshold: 10,
        ..IngestConfig::new(dir.path())
    };
    let ing = ingestor_with(store.clone(), config);
    let before = store.day_histogram().unwrap();

    let deleted = ing.prune().unwrap();
    let after = store.day_histogram().unwrap();

    // Days 3 and 4 fit (8 rows); adding day 2 would exceed 10, so days 1-2 go.
    assert_eq!(deleted, 8);
    assert!(store.count().unwrap() <= 10);
    let cutoff = *before.keys().nth(1).unwrap();
    for day in after.keys() {
        assert!(*day > cutoff);
    }
    for (day, count) in &after {
        assert_eq!(before.get(day), Some(count), "newer day {} was touched", day);
    }
    assert_eq!(ing.bitset().cardinality(), 8);
}

#[test]
fn test_prune_respects_batch_limit() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(MemoryLogStore::new());
    seed_days(&store, &[6, 6, 2]);

    let config = IngestConfig {
        retention_threshold: 3,
        prune_batch_limit: 5,
        ..IngestConfig::new(dir.path())
    };
    let ing = ingestor_with(store.clone(), config);

    assert_eq!(ing.prune().unwrap(), 5);
    assert_eq!(ing.prune().unwrap(), 5);
    assert_eq!(ing.prune().unwrap(), 2);
    assert_eq!(store.count().unwrap(), 2);
    assert_eq!(ing.prune().unwrap(), 0);
}

// =============================================================================
// Spool
// =============================================================================

#[test]
fn test_gzip_batch_ingested() {
    let dir = TempDir::new().unwrap();
    let (ing, store) = ingestor(dir.path());

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    writeln!(encoder, "{}", PUB_LINE).unwrap();
    writeln!(encoder, "{}", DEL_LINE).unwrap();
    let compressed = encoder.finish().unwrap();
    spool::write_batch(dir.path(), "node1", &compressed).unwrap();

    let stats = ing.run_pass().unwrap();
    assert_eq!(stats.files, 1);
    assert_eq!(stats.inserted, 2);
    assert_eq!(store.count().unwrap(), 2);
    assert!(spool::pending_files(dir.path()).unwrap().is_empty());
}

#[test]
fn test_temp_files_are_left_alone() {
    let dir = TempDir::new().unwrap();
    let (ing, store) = ingestor(dir.path());

    std::fs::write(dir.path().join("upload.tmp"), PUB_LINE).unwrap();
    std::fs::write(dir.path().join(".hidden"), PUB_LINE).unwrap();

    let stats = ing.run_pass().unwrap();
    assert_eq!(stats.files, 0);
    assert_eq!(store.count().unwrap(), 0);
    assert!(dir.path().join("upload.tmp").exists());
}

#[test]
fn test_corrupt_gzip_is_quarantined() {
    let dir = TempDir::new().unwrap();
    let (ing, _store) = ingestor(dir.path());

    // Valid gzip header followed by a deflate block of reserved type
    let corrupt = [0x1f, 0x8b, 0x08, 0, 0, 0, 0, 0, 0, 0xff, 0xff, 0xff, 0xff, 0xff];
    std::fs::write(dir.path().join("broken"), corrupt).unwrap();
    spool::write_batch(dir.path(), "node2", format!("{}\n", PUB_LINE).as_bytes()).unwrap();

    let stats = ing.run_pass().unwrap();
    assert_eq!(stats.inserted, 1);
    assert!(spool::pending_files(dir.path()).unwrap().is_empty());
    assert!(dir.path().join(".broken.bad").exists());
}

#[test]
fn test_non_utf8_line_in_spool_file_keeps_rest_of_batch() {
    let dir = TempDir::new().unwrap();
    let (ing, store) = ingestor(dir.path());

    let mut batch = format!("{}\n", PUB_LINE).into_bytes();
    batch.extend_from_slice(b"2024-03-01T10:15:32.000Z|PUB|p2|42|/\xff\xfe|PUT|text/csv|1|10.0.0.5|alice|204\n");
    batch.extend_from_slice(format!("{}\n", DEL_LINE).as_bytes());
    spool::write_batch(dir.path(), "node3", &batch).unwrap();

    let stats = ing.run_pass().unwrap();

    assert_eq!(stats.files, 1);
    assert_eq!(stats.inserted, 2);
    assert_eq!(stats.rejected, 1);
    assert_eq!(store.count().unwrap(), 2);
    assert!(spool::pending_files(dir.path()).unwrap().is_empty());
    let quarantined = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(Result::ok)
        .any(|entry| entry.file_name().to_string_lossy().ends_with(".bad"));
    assert!(!quarantined);
}
