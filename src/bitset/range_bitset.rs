//! Range Bitset
//!
//! Invariants:
//! - Intervals are half-open `[start, end)` with `start < end`
//! - No two stored intervals intersect or abut
//! - Iteration order is ascending

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use super::errors::{BitsetError, BitsetResult};

/// A set of u64 record ids stored as disjoint ascending intervals.
///
/// Keyed by interval start; the value is the exclusive interval end.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RangeBitset {
    ranges: BTreeMap<u64, u64>,
}

impl RangeBitset {
    /// Create an empty bitset.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set every bit in `[from, to)`.
    ///
    /// Overlapping and abutting intervals are merged into one.
    pub fn set(&mut self, from: u64, to: u64) -> BitsetResult<()> {
        if from > to {
            return Err(BitsetError::invalid_range(from, to));
        }
        if from == to {
            return Ok(());
        }

        let mut start = from;
        let mut end = to;

        if let Some((&s, &e)) = self.ranges.range(..=from).next_back() {
            if e >= from {
                start = s;
                end = end.max(e);
            }
        }

        let absorbed: Vec<u64> = self.ranges.range(start..=end).map(|(&s, _)| s).collect();
        for key in absorbed {
            if let Some(e) = self.ranges.remove(&key) {
                end = end.max(e);
            }
        }

        self.ranges.insert(start, end);
        Ok(())
    }

    /// Clear every bit in `[from, to)`, splitting intervals as needed.
    pub fn clear(&mut self, from: u64, to: u64) -> BitsetResult<()> {
        if from > to {
            return Err(BitsetError::invalid_range(from, to));
        }
        if from == to {
            return Ok(());
        }

        // An interval starting before `from` may straddle it.
        if let Some((&s, &e)) = self.ranges.range(..from).next_back() {
            if e > from {
                self.ranges.insert(s, from);
                if e > to {
                    self.ranges.insert(to, e);
                    return Ok(());
                }
            }
        }

        let inside: Vec<(u64, u64)> = self
            .ranges
            .range(from..to)
            .map(|(&s, &e)| (s, e))
            .collect();
        for (s, e) in inside {
            self.ranges.remove(&s);
            if e > to {
                self.ranges.insert(to, e);
            }
        }

        Ok(())
    }

    /// Set a single bit.
    pub fn set_bit(&mut self, bit: u64) -> BitsetResult<()> {
        let end = bit
            .checked_add(1)
            .ok_or_else(|| BitsetError::invalid_range(bit, bit))?;
        self.set(bit, end)
    }

    /// Clear a single bit.
    pub fn clear_bit(&mut self, bit: u64) -> BitsetResult<()> {
        let end = bit
            .checked_add(1)
            .ok_or_else(|| BitsetError::invalid_range(bit, bit))?;
        self.clear(bit, end)
    }

    /// Test whether `bit` is set.
    pub fn get(&self, bit: u64) -> bool {
        self.ranges
            .range(..=bit)
            .next_back()
            .map(|(_, &end)| bit < end)
            .unwrap_or(false)
    }

    /// Keep only the bits also set in `other`.
    pub fn and(&mut self, other: &RangeBitset) {
        let mut result = BTreeMap::new();
        let mut mine = self.ranges.iter().map(|(&s, &e)| (s, e)).peekable();
        let mut theirs = other.ranges.iter().map(|(&s, &e)| (s, e)).peekable();

        while let (Some(&(s1, e1)), Some(&(s2, e2))) = (mine.peek(), theirs.peek()) {
            let start = s1.max(s2);
            let end = e1.min(e2);
            if start < end {
                result.insert(start, end);
            }
            if e1 <= e2 {
                mine.next();
            } else {
                theirs.next();
            }
        }

        self.ranges = result;
    }

    /// Remove every bit that is set in `other`.
    pub fn and_not(&mut self, other: &RangeBitset) {
        for (start, end) in other.intervals() {
            // Stored intervals are always well formed.
            let _ = self.clear(start, end);
        }
    }

    /// Number of set bits.
    pub fn cardinality(&self) -> u64 {
        self.ranges.iter().map(|(&s, &e)| e - s).sum()
    }

    /// One past the highest set bit, or 0 when empty.
    pub fn length(&self) -> u64 {
        self.ranges
            .iter()
            .next_back()
            .map(|(_, &end)| end)
            .unwrap_or(0)
    }

    /// Whether no bit is set.
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Number of stored intervals.
    pub fn interval_count(&self) -> usize {
        self.ranges.len()
    }

    /// Stored intervals as `(start, end)` half-open pairs, ascending.
    pub fn intervals(&self) -> impl Iterator<Item = (u64, u64)> + '_ {
        self.ranges.iter().map(|(&s, &e)| (s, e))
    }

    /// Every set bit, ascending.
    pub fn iter(&self) -> impl Iterator<Item = u64> + '_ {
        self.intervals().flat_map(|(s, e)| s..e)
    }
}

impl fmt::Display for RangeBitset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (start, end) in self.intervals() {
            if !first {
                f.write_str(",")?;
            }
            first = false;
            if end - start == 1 {
                write!(f, "{}", start)?;
            } else {
                write!(f, "{}-{}", start, end - 1)?;
            }
        }
        Ok(())
    }
}

impl FromStr for RangeBitset {
    type Err = BitsetError;

    /// Parse `"a-b,c,d-e"`. Whitespace and newlines also separate items.
    fn from_str(text: &str) -> BitsetResult<Self> {
        let mut bitset = RangeBitset::new();

        for item in text
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|item| !item.is_empty())
        {
            let (lo, hi) = match item.split_once('-') {
                Some((lo, hi)) => (parse_index(lo, item)?, parse_index(hi, item)?),
                None => {
                    let bit = parse_index(item, item)?;
                    (bit, bit)
                }
            };
            if lo > hi {
                return Err(BitsetError::Parse(format!("descending range '{}'", item)));
            }
            let end = hi
                .checked_add(1)
                .ok_or_else(|| BitsetError::Parse(format!("range end overflows '{}'", item)))?;
            bitset.set(lo, end)?;
        }

        Ok(bitset)
    }
}

fn parse_index(text: &str, item: &str) -> BitsetResult<u64> {
    text.parse::<u64>()
        .map_err(|_| BitsetError::Parse(format!("bad index in '{}'", item)))
}

impl FromIterator<u64> for RangeBitset {
    fn from_iter<I: IntoIterator<Item = u64>>(iter: I) -> Self {
        let mut bitset = RangeBitset::new();
        for bit in iter {
            let _ = bitset.set_bit(bit);
        }
        bitset
    }
}
