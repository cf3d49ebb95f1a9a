//! Deterministic timer scheduler for single-threaded reactor loops.
//!
//! A host event loop owns a [`TimerScheduler`], arms one-shot, periodic and
//! restartable timers through opaque [`TimerId`] handles, and calls
//! [`TimerScheduler::tick`] once per iteration. Due timers are handed to the
//! loop's [`Invoker`] in `(fire_at, insertion)` order.
//!
//! ```
//! use std::time::Duration;
//! use reactor_timers::{DeterministicClock, TimerId, TimerScheduler};
//!
//! let mut timers = TimerScheduler::with_clock(DeterministicClock::new(0));
//! let id = timers.add_timer(Duration::from_millis(250), 7_u32).unwrap();
//!
//! timers.clock().advance_ms(250);
//! let mut fired = Vec::new();
//! timers.tick_now(&mut |id: TimerId, tag: &mut u32, _: &mut TimerScheduler<u32, DeterministicClock>| {
//!     fired.push((id, *tag));
//! });
//! assert_eq!(fired, vec![(id, 7)]);
//! ```

pub mod clock;
pub mod config;
pub mod error;
pub mod fire_queue;
pub mod registry;
pub mod scheduler;

pub use clock::{Clock, DeterministicClock, MonotonicClock, Timestamp, delay_from_secs};
pub use config::{DEFAULT_MAX_OUTSTANDING_TIMERS, SchedulerConfig};
pub use error::{Error, Result};
pub use registry::{TimerId, TimerKind, TimerState};
pub use scheduler::{Invoker, TimerScheduler};
