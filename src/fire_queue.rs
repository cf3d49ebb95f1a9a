//! Fire-time ordered index of pending timers.
//!
//! Entries are keyed by `(fire_at, seq)`, so timers with equal deadlines pop
//! in the order they were queued. A side index by [`TimerId`] makes removal
//! O(log n) without tombstones, and guarantees at most one entry per timer.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::clock::Timestamp;
use crate::registry::TimerId;

/// Monotonically increasing sequence counter for deterministic ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Seq(u64);

impl Seq {
    /// Create the initial sequence value.
    #[must_use]
    pub const fn zero() -> Self {
        Self(0)
    }

    /// Get the next sequence value.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Get the raw value.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Seq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "seq:{}", self.0)
    }
}

/// An entry popped from the queue because its deadline was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DueEntry {
    pub id: TimerId,
    pub fire_at: Timestamp,
    pub seq: Seq,
}

#[derive(Debug, Default)]
pub struct FireQueue {
    by_deadline: BTreeMap<(Timestamp, Seq), TimerId>,
    positions: HashMap<TimerId, (Timestamp, Seq)>,
}

impl FireQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Queue `id` to fire at `fire_at`. An id that is already queued is moved.
    pub fn push(&mut self, id: TimerId, fire_at: Timestamp, seq: Seq) {
        if let Some(previous) = self.positions.insert(id, (fire_at, seq)) {
            self.by_deadline.remove(&previous);
        }
        self.by_deadline.insert((fire_at, seq), id);
    }

    /// Drop `id` from the queue. Returns `false` when it was not queued.
    pub fn remove(&mut self, id: TimerId) -> bool {
        match self.positions.remove(&id) {
            Some(key) => {
                self.by_deadline.remove(&key);
                true
            }
            None => false,
        }
    }

    /// Pop every entry with `fire_at <= now`, earliest first.
    pub fn pop_due(&mut self, now: Timestamp) -> Vec<DueEntry> {
        let mut due = Vec::new();
        while let Some(entry) = self.by_deadline.first_entry() {
            let (fire_at, seq) = *entry.key();
            if fire_at > now {
                break;
            }
            let id = entry.remove();
            self.positions.remove(&id);
            due.push(DueEntry { id, fire_at, seq });
        }
        due
    }

    /// Deadline of the earliest queued entry.
    #[must_use]
    pub fn peek_deadline(&self) -> Option<Timestamp> {
        self.by_deadline
            .first_key_value()
            .map(|(&(fire_at, _), _)| fire_at)
    }
}
