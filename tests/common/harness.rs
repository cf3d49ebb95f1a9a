//! Deterministic reactor loop for scenario tests.
//!
//! `Reactor::run` plays the host loop: it runs a setup block, then jumps the
//! clock straight to the next timer deadline and ticks, until a callback
//! calls `stop`. A deadline at or before the previous tick is reached by
//! stepping the clock one millisecond past it. Callbacks get a [`Ctl`] with the same timer API the setup
//! block has, mirroring how reactor callbacks schedule more work.
//!
//! # Example
//!
//! ```ignore
//! let fired = Rc::new(Cell::new(false));
//! let mut reactor = Reactor::new();
//! reactor.run(|ctl| {
//!     let fired = Rc::clone(&fired);
//!     ctl.add_timer(0.25, move |ctl| {
//!         fired.set(true);
//!         ctl.stop();
//!     })
//!     .unwrap();
//! });
//! assert!(fired.get());
//! ```

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use reactor_timers::{
    Clock, DeterministicClock, Result, SchedulerConfig, TimerId, TimerScheduler, Timestamp,
};

pub type Callback = Box<dyn FnMut(&mut Ctl<'_>)>;
pub type Timers = TimerScheduler<Callback, Arc<DeterministicClock>>;

/// Upper bound on loop iterations before a scenario is declared hung.
pub const MAX_ITERATIONS: usize = 10_000;

/// Handle given to setup blocks and timer callbacks.
pub struct Ctl<'a> {
    timers: &'a mut Timers,
    stopped: &'a mut bool,
    current: Option<TimerId>,
}

impl Ctl<'_> {
    pub fn add_timer(
        &mut self,
        secs: f64,
        callback: impl FnMut(&mut Ctl<'_>) + 'static,
    ) -> Result<TimerId> {
        self.timers.add_timer_secs(secs, Box::new(callback))
    }

    pub fn add_periodic_timer(
        &mut self,
        secs: f64,
        callback: impl FnMut(&mut Ctl<'_>) + 'static,
    ) -> Result<TimerId> {
        self.timers.add_periodic_timer_secs(secs, Box::new(callback))
    }

    pub fn add_restartable_timer(
        &mut self,
        secs: f64,
        callback: impl FnMut(&mut Ctl<'_>) + 'static,
    ) -> Result<TimerId> {
        self.timers.add_restartable_timer_secs(secs, Box::new(callback))
    }

    pub fn cancel_timer(&mut self, id: TimerId) -> bool {
        self.timers.cancel(id)
    }

    pub fn restart(&mut self, id: TimerId) -> bool {
        self.timers.restart(id)
    }

    /// The timer whose callback is running, `None` in the setup block.
    pub const fn current(&self) -> Option<TimerId> {
        self.current
    }

    pub fn now(&self) -> Timestamp {
        self.timers.now()
    }

    pub fn timers(&mut self) -> &mut Timers {
        &mut *self.timers
    }

    pub fn stop(&mut self) {
        *self.stopped = true;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    pub iterations: usize,
    pub fired: usize,
    pub stopped_at: Timestamp,
}

pub struct Reactor {
    timers: Timers,
    clock: Arc<DeterministicClock>,
    stopped: bool,
}

impl Reactor {
    pub fn new() -> Self {
        Self::with_config(SchedulerConfig::unbounded())
    }

    pub fn with_config(config: SchedulerConfig) -> Self {
        super::logging::init_tracing();
        let clock = Arc::new(DeterministicClock::new(0));
        let timers = TimerScheduler::with_config(config, Arc::clone(&clock))
            .expect("valid scheduler config");
        Self {
            timers,
            clock,
            stopped: false,
        }
    }

    pub fn timers(&mut self) -> &mut Timers {
        &mut self.timers
    }

    pub fn clock(&self) -> &DeterministicClock {
        &self.clock
    }

    /// Run `setup`, then loop until a callback calls [`Ctl::stop`].
    ///
    /// Panics if the loop goes idle (nothing pending, never stopped) or
    /// exceeds [`MAX_ITERATIONS`].
    pub fn run(&mut self, setup: impl FnOnce(&mut Ctl<'_>)) -> RunReport {
        self.stopped = false;
        setup(&mut Ctl {
            timers: &mut self.timers,
            stopped: &mut self.stopped,
            current: None,
        });

        let mut iterations = 0;
        let mut fired = 0;
        while !self.stopped {
            let deadline = self
                .timers
                .next_deadline()
                .expect("reactor went idle without being stopped");
            let target = match self.timers.last_tick() {
                Some(last) if deadline <= last => last.saturating_add(Duration::from_millis(1)),
                _ => deadline,
            };
            self.clock.set(target);

            let now = self.clock.now();
            let stopped = &mut self.stopped;
            fired += self.timers.tick(
                now,
                &mut |id: TimerId, callback: &mut Callback, timers: &mut Timers| {
                    callback(&mut Ctl {
                        timers,
                        stopped: &mut *stopped,
                        current: Some(id),
                    });
                },
            );

            iterations += 1;
            assert!(
                iterations < MAX_ITERATIONS,
                "reactor did not stop within {MAX_ITERATIONS} iterations"
            );
        }

        RunReport {
            iterations,
            fired,
            stopped_at: self.clock.now(),
        }
    }
}

impl Default for Reactor {
    fn default() -> Self {
        Self::new()
    }
}
