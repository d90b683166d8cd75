//! Record Id Allocation Tests
//!
//! - PODs with different install-time roles never collide
//! - Allocation wraps to the band start past the band end
//! - A restarted POD resumes after its own highest id

use std::collections::HashSet;

use chrono::{TimeZone, Utc};
use provsync::logs::{
    Band, LogRecord, LogRecordStore, MemoryLogStore, RecordIdAllocator, RecordType, BAND_SIZE,
};

#[test]
fn test_two_pods_never_collide() {
    let pod_a = Band::for_pod("pod-a", "pod-a", "pod-b");
    let pod_b = Band::for_pod("pod-b", "pod-a", "pod-b");
    assert_ne!(pod_a, pod_b);

    let a = RecordIdAllocator::starting_after(pod_a, None);
    let b = RecordIdAllocator::starting_after(pod_b, None);

    let mut seen = HashSet::new();
    for _ in 0..10_000 {
        assert!(seen.insert(a.next_id()));
        assert!(seen.insert(b.next_id()));
    }
    assert_eq!(seen.len(), 20_000);
}

#[test]
fn test_band_follows_initial_role_not_current_role() {
    // pod-b is ACTIVE after a failover, but keeps the standby band.
    assert_eq!(Band::for_pod("pod-b", "pod-a", "pod-b"), Band::InitialStandby);
    assert_eq!(Band::for_pod("POD-A", "pod-a", "pod-b"), Band::InitialActive);
    assert_eq!(Band::for_pod("laptop", "pod-a", "pod-b"), Band::Other);
}

#[test]
fn test_overflow_wraps_to_band_start() {
    let band = Band::InitialStandby;
    let allocator = RecordIdAllocator::starting_at(band, band.end() - 2);

    assert_eq!(allocator.next_id(), band.end() - 2);
    assert_eq!(allocator.next_id(), band.end() - 1);
    assert_eq!(allocator.next_id(), band.start());
    assert_eq!(allocator.next_id(), band.start() + 1);
}

#[test]
fn test_bands_partition_id_space() {
    assert_eq!(Band::InitialActive.start(), 0);
    assert_eq!(Band::InitialStandby.start(), BAND_SIZE);
    assert_eq!(Band::Other.start(), 2 * BAND_SIZE);
    assert_eq!(Band::Other.end(), 3 * BAND_SIZE);
}

#[test]
fn test_resume_after_restart() {
    let store = MemoryLogStore::new();
    let at = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
    let standby = Band::InitialStandby;

    for id in [5, standby.start() + 41, standby.start() + 7] {
        let record = LogRecord::new(at, RecordType::Publish, format!("p{}", id), 1).with_id(id);
        store.insert(&record).unwrap();
    }

    let allocator = RecordIdAllocator::resume(standby, &store).unwrap();
    assert_eq!(allocator.next_id(), standby.start() + 42);

    let other = RecordIdAllocator::resume(Band::Other, &store).unwrap();
    assert_eq!(other.next_id(), Band::Other.start());
}
