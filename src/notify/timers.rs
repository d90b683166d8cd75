//! Two-deadline debounce state
//!
//! `soft` absorbs a burst of edits into one notification after a quiet
//! period; `hard` bounds the delay when edits never stop.
//!
//! - `soft` only ever moves later
//! - `hard` is set by the first change of a burst and kept until fire
//! - Firing clears both

/// Pending poke deadlines in epoch milliseconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PokeTimers {
    pub soft: Option<u64>,
    pub hard: Option<u64>,
}

impl PokeTimers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a change.
    pub fn mark(&mut self, soft_deadline: u64, hard_deadline: u64) {
        self.soft = Some(self.soft.map_or(soft_deadline, |s| s.max(soft_deadline)));
        if self.hard.is_none() {
            self.hard = Some(hard_deadline);
        }
    }

    /// Whether a change is waiting to be announced.
    pub fn is_pending(&self) -> bool {
        self.soft.is_some() || self.hard.is_some()
    }

    /// Whether either deadline has been reached at `now`.
    pub fn is_due(&self, now: u64) -> bool {
        self.soft.is_some_and(|s| now >= s) || self.hard.is_some_and(|h| now >= h)
    }

    /// Clear both deadlines if due. Returns whether they fired.
    pub fn take_if_due(&mut self, now: u64) -> bool {
        if self.is_due(now) {
            *self = Self::default();
            true
        } else {
            false
        }
    }
}
