//! Timer records, their identities, and the outstanding-timer cap.
//!
//! # Invariants
//!
//! - ids are issued from a monotone counter and never reused
//! - a record leaves the registry as soon as it is cancelled, so a cancelled
//!   id can never become pending again
//! - `pending` always equals the number of records in [`TimerState::Pending`]

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use crate::clock::Timestamp;
use crate::error::{Error, Result};
use crate::fire_queue::Seq;

/// Opaque handle to a scheduled timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(u64);

impl TimerId {
    pub(crate) const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the raw value.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TimerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer:{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// Fires once, then is removed.
    OneShot,
    /// Re-arms at `fire_at + interval` after every firing.
    Periodic { interval: Duration },
    /// Fires once; may be re-armed with `delay` until it does.
    Restartable { delay: Duration },
}

impl TimerKind {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::OneShot => "one_shot",
            Self::Periodic { .. } => "periodic",
            Self::Restartable { .. } => "restartable",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    Pending,
    Fired,
    Cancelled,
}

pub struct TimerRecord<T> {
    id: TimerId,
    fire_at: Timestamp,
    kind: TimerKind,
    state: TimerState,
    seq: Seq,
    // `None` only while the callback is out with the invoker.
    callback: Option<T>,
}

impl<T> TimerRecord<T> {
    #[must_use]
    pub const fn fire_at(&self) -> Timestamp {
        self.fire_at
    }

    #[must_use]
    pub const fn kind(&self) -> TimerKind {
        self.kind
    }

    #[must_use]
    pub const fn state(&self) -> TimerState {
        self.state
    }

    /// Insertion sequence of the record's current queue entry.
    #[must_use]
    pub const fn seq(&self) -> Seq {
        self.seq
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.state == TimerState::Pending
    }

    /// Give up the callback, e.g. after the record was removed.
    pub fn into_callback(self) -> Option<T> {
        self.callback
    }
}

impl<T> fmt::Debug for TimerRecord<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerRecord")
            .field("id", &self.id)
            .field("fire_at", &self.fire_at)
            .field("kind", &self.kind)
            .field("state", &self.state)
            .field("seq", &self.seq)
            .field("has_callback", &self.callback.is_some())
            .finish()
    }
}

pub struct TimerRegistry<T> {
    records: HashMap<TimerId, TimerRecord<T>>,
    next_id: u64,
    pending: usize,
    max_pending: Option<usize>,
}

impl<T> TimerRegistry<T> {
    #[must_use]
    pub fn new(max_pending: Option<usize>) -> Self {
        Self {
            records: HashMap::new(),
            next_id: 1,
            pending: 0,
            max_pending,
        }
    }

    /// Number of live records, pending or fired-and-retained.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub const fn pending_count(&self) -> usize {
        self.pending
    }

    #[must_use]
    pub const fn max_pending(&self) -> Option<usize> {
        self.max_pending
    }

    /// Change the cap. Already pending timers are never evicted; the new
    /// limit applies to the next `create`.
    pub const fn set_max_pending(&mut self, max_pending: Option<usize>) {
        self.max_pending = max_pending;
    }

    #[must_use]
    pub fn has_capacity(&self) -> bool {
        self.max_pending.is_none_or(|limit| self.pending < limit)
    }

    /// Register a pending timer.
    ///
    /// Fails with [`Error::CapacityExceeded`] when the cap is reached; the
    /// registry is untouched in that case and no id is consumed.
    pub fn create(
        &mut self,
        kind: TimerKind,
        fire_at: Timestamp,
        seq: Seq,
        callback: T,
    ) -> Result<TimerId> {
        if !self.has_capacity() {
            return Err(Error::CapacityExceeded {
                limit: self.max_pending.unwrap_or_default(),
            });
        }

        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.records.insert(
            id,
            TimerRecord {
                id,
                fire_at,
                kind,
                state: TimerState::Pending,
                seq,
                callback: Some(callback),
            },
        );
        self.pending += 1;
        Ok(id)
    }

    #[must_use]
    pub fn lookup(&self, id: TimerId) -> Option<&TimerRecord<T>> {
        self.records.get(&id)
    }

    /// `Pending -> Fired`, keeping the record. Returns `false` unless the
    /// record was pending.
    pub fn mark_fired(&mut self, id: TimerId) -> bool {
        match self.records.get_mut(&id) {
            Some(record) if record.state == TimerState::Pending => {
                record.state = TimerState::Fired;
                self.pending -= 1;
                true
            }
            _ => false,
        }
    }

    /// Cancel and remove the record. Returns it (in state `Cancelled`) so the
    /// caller can dispose of the callback; `None` for unknown ids.
    pub fn mark_cancelled(&mut self, id: TimerId) -> Option<TimerRecord<T>> {
        let mut record = self.records.remove(&id)?;
        if record.state == TimerState::Pending {
            self.pending -= 1;
        }
        record.state = TimerState::Cancelled;
        Some(record)
    }

    /// Remove a record that has run its course (a fired one-shot).
    pub fn retire(&mut self, id: TimerId) -> Option<TimerRecord<T>> {
        let record = self.records.remove(&id)?;
        if record.state == TimerState::Pending {
            self.pending -= 1;
        }
        Some(record)
    }

    /// Move a pending record to a new fire time and queue sequence.
    pub fn reschedule(&mut self, id: TimerId, fire_at: Timestamp, seq: Seq) -> bool {
        match self.records.get_mut(&id) {
            Some(record) if record.state == TimerState::Pending => {
                record.fire_at = fire_at;
                record.seq = seq;
                true
            }
            _ => false,
        }
    }

    /// Change the interval of a live periodic record.
    pub fn set_interval(&mut self, id: TimerId, interval: Duration) -> bool {
        match self.records.get_mut(&id) {
            Some(TimerRecord {
                kind: TimerKind::Periodic { interval: current },
                state: TimerState::Pending,
                ..
            }) => {
                *current = interval;
                true
            }
            _ => false,
        }
    }

    pub(crate) fn take_callback(&mut self, id: TimerId) -> Option<T> {
        self.records.get_mut(&id)?.callback.take()
    }

    /// Hand a callback back after invocation. If the record is gone (the
    /// callback cancelled its own timer) the callback is returned instead.
    pub(crate) fn restore_callback(&mut self, id: TimerId, callback: T) -> Option<T> {
        match self.records.get_mut(&id) {
            Some(record) => {
                record.callback = Some(callback);
                None
            }
            None => Some(callback),
        }
    }
}

impl<T> fmt::Debug for TimerRegistry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerRegistry")
            .field("records", &self.records.len())
            .field("pending", &self.pending)
            .field("max_pending", &self.max_pending)
            .field("next_id", &self.next_id)
            .finish()
    }
}
