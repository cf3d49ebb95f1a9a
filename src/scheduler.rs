//! Timer scheduler driven by a single-threaded reactor loop.
//!
//! The host loop arms timers through the handle-based API (`add_*`,
//! `cancel`, `restart`) and calls [`TimerScheduler::tick`] once per
//! iteration to fire everything that is due.
//!
//! # Invariants
//!
//! - **stable order:** within one tick, timers fire in `(fire_at, seq)` order
//! - **snapshot drain:** the due set is taken before any callback runs;
//!   timers armed by a callback fire on a later tick at the earliest
//! - **late cancel wins:** each due record is re-checked right before its
//!   callback runs, so a cancel from an earlier callback in the same tick
//!   always suppresses it
//! - **one entry per timer:** the fire queue holds exactly the pending records
//! - **advancing ticks:** a tick whose `now` is not later than the previous
//!   tick's drains nothing

use std::fmt;
use std::time::Duration;

use crate::clock::{Clock, MonotonicClock, Timestamp, delay_from_secs};
use crate::config::SchedulerConfig;
use crate::error::Result;
use crate::fire_queue::{DueEntry, FireQueue, Seq};
use crate::registry::{TimerId, TimerKind, TimerRecord, TimerRegistry, TimerState};

/// The reactor's dispatch hook for due timers.
///
/// `invoke` receives the timer's callback payload and mutable access to the
/// scheduler, so a callback may add, cancel or restart timers (its own
/// included) while the tick is in progress.
pub trait Invoker<T, C: Clock> {
    fn invoke(&mut self, id: TimerId, callback: &mut T, timers: &mut TimerScheduler<T, C>);
}

impl<T, C, F> Invoker<T, C> for F
where
    C: Clock,
    F: FnMut(TimerId, &mut T, &mut TimerScheduler<T, C>),
{
    fn invoke(&mut self, id: TimerId, callback: &mut T, timers: &mut TimerScheduler<T, C>) {
        self(id, callback, timers);
    }
}

/// Registry + fire queue behind the handle-based timer API.
pub struct TimerScheduler<T, C: Clock = MonotonicClock> {
    registry: TimerRegistry<T>,
    queue: FireQueue,
    /// Next insertion sequence; only consumed when an entry is queued.
    seq: Seq,
    last_tick: Option<Timestamp>,
    clock: C,
}

impl<T> TimerScheduler<T, MonotonicClock> {
    /// Create a scheduler on a fresh monotonic clock with default config.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(MonotonicClock::new())
    }
}

impl<T> Default for TimerScheduler<T, MonotonicClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, C: Clock> TimerScheduler<T, C> {
    /// Create a scheduler with a custom clock and default config.
    #[must_use]
    pub fn with_clock(clock: C) -> Self {
        Self::build(SchedulerConfig::default(), clock)
    }

    /// Create a scheduler from a validated config.
    pub fn with_config(config: SchedulerConfig, clock: C) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config, clock))
    }

    fn build(config: SchedulerConfig, clock: C) -> Self {
        Self {
            registry: TimerRegistry::new(config.max_outstanding_timers),
            queue: FireQueue::new(),
            seq: Seq::zero(),
            last_tick: None,
            clock,
        }
    }

    #[must_use]
    pub const fn clock(&self) -> &C {
        &self.clock
    }

    /// Current time from the injected clock.
    #[must_use]
    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// `now` of the latest tick that moved time forward.
    #[must_use]
    pub const fn last_tick(&self) -> Option<Timestamp> {
        self.last_tick
    }

    const fn next_seq(&mut self) -> Seq {
        let current = self.seq;
        self.seq = self.seq.next();
        current
    }

    // ── configuration ────────────────────────────────────────────────

    /// Outstanding-timer cap; `None` is unbounded.
    #[must_use]
    pub const fn max_timers(&self) -> Option<usize> {
        self.registry.max_pending()
    }

    /// Change the cap. Takes effect on the next `add_*`; timers already
    /// pending are kept even if they now exceed it.
    ///
    /// `Some(0)` is rejected the same way [`SchedulerConfig::validate`]
    /// rejects it; use `None` for unbounded.
    pub fn set_max_timers(&mut self, max: Option<usize>) -> Result<()> {
        SchedulerConfig {
            max_outstanding_timers: max,
        }
        .validate()?;
        tracing::debug!(
            event = "scheduler.config.max_timers",
            previous = ?self.registry.max_pending(),
            max = ?max,
            "Outstanding timer cap changed"
        );
        self.registry.set_max_pending(max);
        Ok(())
    }

    // ── arming ───────────────────────────────────────────────────────

    /// Fire `callback` once, `delay` from now.
    pub fn add_timer(&mut self, delay: Duration, callback: T) -> Result<TimerId> {
        self.arm(TimerKind::OneShot, delay, callback)
    }

    /// Fire `callback` every `interval`, first at `now + interval`.
    ///
    /// Firings are spaced on the scheduled timeline (`fire_at + interval`),
    /// not from when the loop actually got around to running them.
    pub fn add_periodic_timer(&mut self, interval: Duration, callback: T) -> Result<TimerId> {
        self.arm(TimerKind::Periodic { interval }, interval, callback)
    }

    /// Fire `callback` once, `delay` from now; until it fires, `restart`
    /// pushes the deadline back to `delay` from the time of the restart.
    pub fn add_restartable_timer(&mut self, delay: Duration, callback: T) -> Result<TimerId> {
        self.arm(TimerKind::Restartable { delay }, delay, callback)
    }

    /// [`add_timer`](Self::add_timer) with the delay in float seconds.
    pub fn add_timer_secs(&mut self, secs: f64, callback: T) -> Result<TimerId> {
        self.add_timer(delay_from_secs(secs)?, callback)
    }

    pub fn add_periodic_timer_secs(&mut self, secs: f64, callback: T) -> Result<TimerId> {
        self.add_periodic_timer(delay_from_secs(secs)?, callback)
    }

    pub fn add_restartable_timer_secs(&mut self, secs: f64, callback: T) -> Result<TimerId> {
        self.add_restartable_timer(delay_from_secs(secs)?, callback)
    }

    fn arm(&mut self, kind: TimerKind, delay: Duration, callback: T) -> Result<TimerId> {
        let fire_at = self.clock.now().saturating_add(delay);
        let seq = self.seq;

        let id = self
            .registry
            .create(kind, fire_at, seq, callback)
            .inspect_err(|err| {
                tracing::debug!(
                    event = "scheduler.timer.rejected",
                    kind = kind.name(),
                    pending = self.registry.pending_count(),
                    error = %err,
                    "Timer rejected"
                );
            })?;
        self.seq = seq.next();
        self.queue.push(id, fire_at, seq);

        tracing::trace!(
            event = "scheduler.timer.set",
            timer_id = id.value(),
            kind = kind.name(),
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            fire_at_ms = fire_at.as_millis(),
            %seq,
            "Timer scheduled"
        );

        Ok(id)
    }

    // ── handle operations ────────────────────────────────────────────

    /// Cancel a timer by id.
    ///
    /// Returns `true` if the timer was live (pending, or a fired restartable
    /// timer) and is now cancelled. Unknown, already cancelled and already
    /// fired one-shot ids are a no-op returning `false`.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        let Some(record) = self.registry.mark_cancelled(id) else {
            tracing::trace!(
                event = "scheduler.timer.cancel",
                timer_id = id.value(),
                cancelled = false,
                "Cancel ignored for unknown timer"
            );
            return false;
        };
        let dequeued = self.queue.remove(id);

        tracing::trace!(
            event = "scheduler.timer.cancel",
            timer_id = id.value(),
            kind = record.kind().name(),
            dequeued,
            cancelled = true,
            "Timer cancelled"
        );
        true
    }

    /// Push a pending restartable timer's deadline to `now + delay`.
    ///
    /// Returns `false` and changes nothing when the timer already fired, was
    /// cancelled, is unknown, or is not restartable.
    pub fn restart(&mut self, id: TimerId) -> bool {
        let delay = match self.registry.lookup(id) {
            Some(record) if record.is_pending() => match record.kind() {
                TimerKind::Restartable { delay } => delay,
                TimerKind::OneShot | TimerKind::Periodic { .. } => return false,
            },
            _ => {
                tracing::trace!(
                    event = "scheduler.timer.restart",
                    timer_id = id.value(),
                    restarted = false,
                    "Restart ignored"
                );
                return false;
            }
        };

        let fire_at = self.clock.now().saturating_add(delay);
        let seq = self.next_seq();
        self.registry.reschedule(id, fire_at, seq);
        self.queue.push(id, fire_at, seq);

        tracing::trace!(
            event = "scheduler.timer.restart",
            timer_id = id.value(),
            fire_at_ms = fire_at.as_millis(),
            %seq,
            restarted = true,
            "Timer restarted"
        );
        true
    }

    /// Change a periodic timer's interval. The current deadline stands; the
    /// new interval applies from the next reschedule.
    pub fn set_interval(&mut self, id: TimerId, interval: Duration) -> bool {
        self.registry.set_interval(id, interval)
    }

    // ── inspection ───────────────────────────────────────────────────

    #[must_use]
    pub fn state(&self, id: TimerId) -> Option<TimerState> {
        self.registry.lookup(id).map(TimerRecord::state)
    }

    #[must_use]
    pub fn kind(&self, id: TimerId) -> Option<TimerKind> {
        self.registry.lookup(id).map(TimerRecord::kind)
    }

    /// Scheduled fire time of a pending timer.
    #[must_use]
    pub fn fire_at(&self, id: TimerId) -> Option<Timestamp> {
        self.registry
            .lookup(id)
            .filter(|record| record.is_pending())
            .map(TimerRecord::fire_at)
    }

    #[must_use]
    pub fn is_pending(&self, id: TimerId) -> bool {
        self.state(id) == Some(TimerState::Pending)
    }

    /// Number of live records, including fired restartable timers.
    #[must_use]
    pub fn timer_count(&self) -> usize {
        self.registry.len()
    }

    /// Number of timers waiting to fire; this is what the cap bounds.
    #[must_use]
    pub const fn pending_count(&self) -> usize {
        self.registry.pending_count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Get the deadline of the next timer, if any.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Timestamp> {
        self.queue.peek_deadline()
    }

    /// Get the time until the next timer fires, if any. Zero when overdue.
    #[must_use]
    pub fn time_until_next(&self) -> Option<Duration> {
        self.next_deadline()
            .map(|deadline| deadline.saturating_duration_since(self.clock.now()))
    }

    // ── draining ─────────────────────────────────────────────────────

    /// Fire every timer due at `now`, in `(fire_at, seq)` order.
    ///
    /// Returns the number of callbacks invoked. A `now` that does not move
    /// past the previous tick is allowed and fires nothing.
    ///
    /// If the invoker panics, the callback it was running is lost; its timer
    /// is retired the next time it comes due.
    pub fn tick<I>(&mut self, now: Timestamp, invoker: &mut I) -> usize
    where
        I: Invoker<T, C> + ?Sized,
    {
        if let Some(last) = self.last_tick.filter(|&last| now <= last) {
            tracing::trace!(
                event = "scheduler.tick.stalled",
                now_ms = now.as_millis(),
                last_tick_ms = last.as_millis(),
                "Tick time did not advance"
            );
            return 0;
        }
        self.last_tick = Some(now);

        let due = self.queue.pop_due(now);
        if due.is_empty() {
            tracing::trace!(event = "scheduler.tick.idle", now_ms = now.as_millis(), "No timers due");
            return 0;
        }

        let batch = due.len();
        let mut fired = 0usize;
        for entry in due {
            if self.fire(entry, now, invoker) {
                fired += 1;
            }
        }

        tracing::debug!(
            event = "scheduler.tick.drained",
            now_ms = now.as_millis(),
            batch,
            fired,
            pending = self.registry.pending_count(),
            "Tick drained"
        );
        fired
    }

    /// [`tick`](Self::tick) at the injected clock's current time.
    pub fn tick_now<I>(&mut self, invoker: &mut I) -> usize
    where
        I: Invoker<T, C> + ?Sized,
    {
        let now = self.clock.now();
        self.tick(now, invoker)
    }

    fn fire<I>(&mut self, entry: DueEntry, now: Timestamp, invoker: &mut I) -> bool
    where
        I: Invoker<T, C> + ?Sized,
    {
        let DueEntry { id, fire_at, seq } = entry;

        // The entry was popped before any callback in this batch ran; one of
        // them may have cancelled or restarted this timer since.
        let kind = match self.registry.lookup(id) {
            Some(record) if record.is_pending() && record.seq() == seq => record.kind(),
            _ => {
                tracing::trace!(
                    event = "scheduler.timer.skip_stale",
                    timer_id = id.value(),
                    %seq,
                    "Skipped stale timer entry"
                );
                return false;
            }
        };

        tracing::trace!(
            event = "scheduler.timer.fire",
            timer_id = id.value(),
            kind = kind.name(),
            fire_at_ms = fire_at.as_millis(),
            now_ms = now.as_millis(),
            %seq,
            "Timer fired"
        );

        match kind {
            TimerKind::OneShot => {
                let Some(mut callback) = self.registry.retire(id).and_then(TimerRecord::into_callback)
                else {
                    return false;
                };
                invoker.invoke(id, &mut callback, self);
                return true;
            }
            TimerKind::Periodic { interval } => {
                let next_at = fire_at.saturating_add(interval);
                let next_seq = self.next_seq();
                self.registry.reschedule(id, next_at, next_seq);
                self.queue.push(id, next_at, next_seq);
            }
            TimerKind::Restartable { .. } => {
                self.registry.mark_fired(id);
            }
        }

        let Some(mut callback) = self.registry.take_callback(id) else {
            // Lost to a panicking invoker on an earlier tick.
            tracing::debug!(
                event = "scheduler.timer.orphaned",
                timer_id = id.value(),
                kind = kind.name(),
                "Retiring timer without a callback"
            );
            self.cancel(id);
            return false;
        };
        invoker.invoke(id, &mut callback, self);
        // `Some` means the callback cancelled its own timer; drop it here.
        drop(self.registry.restore_callback(id, callback));
        true
    }
}

impl<T, C: Clock> fmt::Debug for TimerScheduler<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerScheduler")
            .field("seq", &self.seq)
            .field("registry", &self.registry)
            .field("queued", &self.queue.len())
            .field("last_tick", &self.last_tick)
            .finish_non_exhaustive()
    }
}
