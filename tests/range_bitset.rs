//! RangeBitset Property Tests
//!
//! Random set/clear sequences checked against a plain ordered set:
//! - get() agrees bit for bit
//! - cardinality() equals the sum of interval lengths
//! - intervals never touch or overlap
//! - text form round-trips

use std::collections::BTreeSet;

use provsync::bitset::RangeBitset;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const UNIVERSE: u64 = 400;

fn apply_random_ops(seed: u64, ops: usize) -> (RangeBitset, BTreeSet<u64>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut bitset = RangeBitset::new();
    let mut reference = BTreeSet::new();

    for _ in 0..ops {
        let a = rng.gen_range(0..UNIVERSE);
        let b = rng.gen_range(0..UNIVERSE);
        let (from, to) = if a <= b { (a, b) } else { (b, a) };

        if rng.gen_bool(0.6) {
            bitset.set(from, to).unwrap();
            reference.extend(from..to);
        } else {
            bitset.clear(from, to).unwrap();
            for bit in from..to {
                reference.remove(&bit);
            }
        }
    }
    (bitset, reference)
}

fn assert_canonical(bitset: &RangeBitset) {
    let intervals: Vec<(u64, u64)> = bitset.intervals().collect();
    for (start, end) in &intervals {
        assert!(start < end, "empty interval {}-{}", start, end);
    }
    for pair in intervals.windows(2) {
        assert!(
            pair[0].1 < pair[1].0,
            "intervals {:?} and {:?} touch or overlap",
            pair[0],
            pair[1]
        );
    }
}

// =============================================================================
// Random Sequences
// =============================================================================

#[test]
fn test_random_sequences_match_reference() {
    for seed in 0..50 {
        let (bitset, reference) = apply_random_ops(seed, 40);

        for bit in 0..UNIVERSE + 5 {
            assert_eq!(bitset.get(bit), reference.contains(&bit), "seed {} bit {}", seed, bit);
        }
        assert_eq!(bitset.cardinality(), reference.len() as u64);
        assert_eq!(
            bitset.cardinality(),
            bitset.intervals().map(|(s, e)| e - s).sum::<u64>()
        );
        assert_eq!(bitset.length(), reference.iter().next_back().map_or(0, |b| b + 1));
        assert_canonical(&bitset);
    }
}

#[test]
fn test_random_sequences_round_trip_text() {
    for seed in 100..130 {
        let (bitset, _) = apply_random_ops(seed, 30);
        let text = bitset.to_string();
        let parsed: RangeBitset = text.parse().unwrap();
        assert_eq!(parsed, bitset, "seed {} text {:?}", seed, text);
    }
}

#[test]
fn test_and_not_matches_set_difference() {
    for seed in 200..220 {
        let (a, ref_a) = apply_random_ops(seed, 25);
        let (b, ref_b) = apply_random_ops(seed + 1_000, 25);

        let mut diff = a.clone();
        diff.and_not(&b);
        let expected: BTreeSet<u64> = ref_a.difference(&ref_b).copied().collect();
        assert_eq!(diff.iter().collect::<BTreeSet<u64>>(), expected);
        assert_canonical(&diff);

        let mut both = a.clone();
        both.and(&b);
        let expected: BTreeSet<u64> = ref_a.intersection(&ref_b).copied().collect();
        assert_eq!(both.iter().collect::<BTreeSet<u64>>(), expected);
    }
}

// =============================================================================
// Set / Clear Inverse
// =============================================================================

#[test]
fn test_clear_is_inverse_of_set() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..100 {
        let from = rng.gen_range(0..1_000u64);
        let to = from + rng.gen_range(0..1_000u64);

        let mut bitset = RangeBitset::new();
        bitset.set(from, to).unwrap();
        for id in [from.saturating_sub(1), from, to.saturating_sub(1), to] {
            assert_eq!(bitset.get(id), id >= from && id < to);
        }

        bitset.clear(from, to).unwrap();
        assert!(bitset.is_empty());
    }
}

#[test]
fn test_high_ids_in_upper_bands() {
    let base = 1u64 << 56;
    let mut bitset = RangeBitset::new();
    bitset.set(base, base + 10).unwrap();
    bitset.set_bit(base + 10).unwrap();

    assert_eq!(bitset.interval_count(), 1);
    let text = bitset.to_string();
    assert_eq!(text, format!("{}-{}", base, base + 10));
    assert_eq!(text.parse::<RangeBitset>().unwrap(), bitset);
}
