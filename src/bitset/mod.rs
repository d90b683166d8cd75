//! Record Id Bitset
//!
//! Interval-encoded set of log record ids. Record ids arrive in long
//! monotonic runs (one allocation band per POD, batch ingestion), so the
//! set is stored as sorted disjoint intervals rather than one bit per id.
//!
//! The text form (`"0-99,120,200-210"`) is both the wire format of the
//! peer bitset endpoint and the request body of the record fetch endpoint.

mod errors;
mod range_bitset;

pub use errors::{BitsetError, BitsetResult};
pub use range_bitset::RangeBitset;
