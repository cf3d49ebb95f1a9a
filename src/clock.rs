//! Clock sources and the millisecond timestamp the scheduler runs on.
//!
//! The host loop owns the clock; the scheduler only reads it when a timer is
//! armed (`fire_at = now + delay`). Draining is driven by an explicit `now`
//! passed to `tick`, so the two never have to agree on a single time source.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::error::{Error, Result};

/// Absolute time in milliseconds on the host loop's clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp(u64);

impl Timestamp {
    pub const ZERO: Self = Self(0);
    pub const MAX: Self = Self(u64::MAX);

    #[must_use]
    pub const fn from_millis(ms: u64) -> Self {
        Self(ms)
    }

    #[must_use]
    pub const fn as_millis(self) -> u64 {
        self.0
    }

    /// Add a delay, rounding sub-millisecond remainders up so the result is
    /// never earlier than `self + delay`.
    #[must_use]
    pub fn saturating_add(self, delay: Duration) -> Self {
        Self(self.0.saturating_add(millis_ceil(delay)))
    }

    /// Time elapsed from `earlier` to `self`, zero if `earlier` is later.
    #[must_use]
    pub const fn saturating_duration_since(self, earlier: Self) -> Duration {
        Duration::from_millis(self.0.saturating_sub(earlier.0))
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

/// Whole milliseconds in `delay`, rounded up.
#[must_use]
pub fn millis_ceil(delay: Duration) -> u64 {
    let whole = delay.as_millis();
    let rounded = if delay.subsec_nanos() % 1_000_000 == 0 {
        whole
    } else {
        whole + 1
    };
    u64::try_from(rounded).unwrap_or(u64::MAX)
}

/// Convert a delay given in float seconds, the unit reactor APIs take.
///
/// Negative, NaN and infinite values are rejected with
/// [`Error::InvalidArgument`].
pub fn delay_from_secs(secs: f64) -> Result<Duration> {
    if !secs.is_finite() {
        return Err(Error::invalid_argument(format!(
            "delay must be a finite number of seconds, got {secs}"
        )));
    }
    if secs < 0.0 {
        return Err(Error::invalid_argument(format!(
            "delay must be >= 0, got {secs}"
        )));
    }
    Duration::try_from_secs_f64(secs)
        .map_err(|err| Error::invalid_argument(format!("delay {secs}s out of range: {err}")))
}

/// A monotonic clock source for the scheduler.
pub trait Clock: Send + Sync {
    /// Current time; must never decrease between calls.
    fn now(&self) -> Timestamp;
}

impl<C: Clock> Clock for Arc<C> {
    fn now(&self) -> Timestamp {
        self.as_ref().now()
    }
}

impl<C: Clock> Clock for &C {
    fn now(&self) -> Timestamp {
        (**self).now()
    }
}

/// Real clock measuring milliseconds since its own construction.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Timestamp {
        let millis = self.origin.elapsed().as_millis();
        Timestamp(u64::try_from(millis).unwrap_or(u64::MAX))
    }
}

/// A manually driven clock for tests and replay.
#[derive(Debug, Default)]
pub struct DeterministicClock {
    current_ms: AtomicU64,
}

impl DeterministicClock {
    /// Create a new deterministic clock starting at the given time.
    #[must_use]
    pub const fn new(start_ms: u64) -> Self {
        Self {
            current_ms: AtomicU64::new(start_ms),
        }
    }

    /// Advance the clock by the given duration (rounded up to whole ms).
    pub fn advance(&self, by: Duration) {
        self.advance_ms(millis_ceil(by));
    }

    pub fn advance_ms(&self, ms: u64) {
        self.current_ms.fetch_add(ms, Ordering::SeqCst);
    }

    /// Move the clock to `to`. Earlier values are ignored so the clock stays
    /// monotonic.
    pub fn set(&self, to: Timestamp) {
        self.current_ms.fetch_max(to.as_millis(), Ordering::SeqCst);
    }
}

impl Clock for DeterministicClock {
    fn now(&self) -> Timestamp {
        Timestamp(self.current_ms.load(Ordering::SeqCst))
    }
}
