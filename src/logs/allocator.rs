//! Record Id Allocation
//!
//! The 64-bit id space is split into fixed bands, one per POD:
//!
//! | Band | Owner                          | Range                  |
//! |------|--------------------------------|------------------------|
//! | 0    | POD initially configured ACTIVE  | `[0, 2^56)`          |
//! | 1    | POD initially configured STANDBY | `[2^56, 2^57)`       |
//! | 2    | any other host                   | `[2^57, 3 * 2^56)`   |
//!
//! Band choice uses the *initial* configuration, never the detected
//! role, so a host keeps its band across failovers. Two PODs therefore
//! never hand out the same id without talking to each other.

use std::fmt;
use std::sync::Mutex;

use super::errors::LogStoreResult;
use super::store::LogRecordStore;

/// Width of one allocation band
pub const BAND_SIZE: u64 = 1 << 56;

/// Allocation band of a POD
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Band {
    InitialActive,
    InitialStandby,
    Other,
}

impl Band {
    /// Band for `this_pod` given the initial POD assignment.
    pub fn for_pod(this_pod: &str, initial_active: &str, initial_standby: &str) -> Self {
        if this_pod.eq_ignore_ascii_case(initial_active) {
            Band::InitialActive
        } else if this_pod.eq_ignore_ascii_case(initial_standby) {
            Band::InitialStandby
        } else {
            Band::Other
        }
    }

    pub fn index(&self) -> u64 {
        match self {
            Band::InitialActive => 0,
            Band::InitialStandby => 1,
            Band::Other => 2,
        }
    }

    /// First id of the band
    pub fn start(&self) -> u64 {
        self.index() * BAND_SIZE
    }

    /// One past the last id of the band
    pub fn end(&self) -> u64 {
        self.start() + BAND_SIZE
    }

    pub fn contains(&self, id: u64) -> bool {
        id >= self.start() && id < self.end()
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "band{}", self.index())
    }
}

/// Hands out monotonically increasing ids inside one band.
#[derive(Debug)]
pub struct RecordIdAllocator {
    band: Band,
    next: Mutex<u64>,
}

impl RecordIdAllocator {
    /// Resume after the highest id `store` already holds in `band`.
    pub fn resume(band: Band, store: &dyn LogRecordStore) -> LogStoreResult<Self> {
        let highest = store.max_id_in(band.start(), band.end())?;
        Ok(Self::starting_after(band, highest))
    }

    /// Allocator whose first id follows `highest` (or the band start).
    pub fn starting_after(band: Band, highest: Option<u64>) -> Self {
        let next = match highest {
            Some(id) if band.contains(id) => id + 1,
            _ => band.start(),
        };
        Self::starting_at(band, next)
    }

    /// Allocator whose first id is `next`, wrapped into the band.
    pub fn starting_at(band: Band, next: u64) -> Self {
        let next = if band.contains(next) { next } else { band.start() };
        Self {
            band,
            next: Mutex::new(next),
        }
    }

    pub fn band(&self) -> Band {
        self.band
    }

    /// Allocate the next id, wrapping to the band start past its end.
    pub fn next_id(&self) -> u64 {
        let mut next = self.next.lock().unwrap_or_else(|e| e.into_inner());
        let id = *next;
        *next = if id + 1 >= self.band.end() {
            self.band.start()
        } else {
            id + 1
        };
        id
    }

    /// The id the next call to [`next_id`](Self::next_id) returns.
    pub fn peek(&self) -> u64 {
        *self.next.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logs::record::{LogRecord, RecordType};
    use crate::logs::store::MemoryLogStore;
    use chrono::Utc;

    #[test]
    fn test_band_selection() {
        assert_eq!(Band::for_pod("pod-a", "pod-a", "pod-b"), Band::InitialActive);
        assert_eq!(Band::for_pod("POD-B", "pod-a", "pod-b"), Band::InitialStandby);
        assert_eq!(Band::for_pod("laptop", "pod-a", "pod-b"), Band::Other);
    }

    #[test]
    fn test_bands_are_disjoint() {
        assert_eq!(Band::InitialActive.end(), Band::InitialStandby.start());
        assert_eq!(Band::InitialStandby.end(), Band::Other.start());
        assert!(Band::Other.end() > Band::Other.start());
    }

    #[test]
    fn test_fresh_allocator_starts_at_band_start() {
        let alloc = RecordIdAllocator::starting_after(Band::InitialStandby, None);
        assert_eq!(alloc.next_id(), BAND_SIZE);
        assert_eq!(alloc.next_id(), BAND_SIZE + 1);
    }

    #[test]
    fn test_resume_ignores_other_bands() {
        let store = MemoryLogStore::new();
        for id in [5, 17, BAND_SIZE + 3] {
            store
                .insert(&LogRecord::new(Utc::now(), RecordType::Publish, format!("p{}", id), 1).with_id(id))
                .unwrap();
        }

        let active = RecordIdAllocator::resume(Band::InitialActive, &store).unwrap();
        assert_eq!(active.next_id(), 18);

        let standby = RecordIdAllocator::resume(Band::InitialStandby, &store).unwrap();
        assert_eq!(standby.next_id(), BAND_SIZE + 4);

        let other = RecordIdAllocator::resume(Band::Other, &store).unwrap();
        assert_eq!(other.next_id(), Band::Other.start());
    }

    #[test]
    fn test_wraps_at_band_end() {
        let band = Band::InitialActive;
        let alloc = RecordIdAllocator::starting_at(band, band.end() - 2);
        assert_eq!(alloc.next_id(), band.end() - 2);
        assert_eq!(alloc.next_id(), band.end() - 1);
        assert_eq!(alloc.next_id(), band.start());
    }

    #[test]
    fn test_resume_from_last_id_wraps() {
        let band = Band::InitialStandby;
        let alloc = RecordIdAllocator::starting_after(band, Some(band.end() - 1));
        assert_eq!(alloc.peek(), band.start());
    }
}
