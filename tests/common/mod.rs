//! Common test infrastructure for `reactor-timers`.
//!
//! - A deterministic reactor loop that drives the scheduler like a host would
//! - `tracing` capture for scheduler events

pub mod harness;
pub mod logging;

#[allow(unused_imports)]
pub use harness::{Callback, Ctl, Reactor, RunReport, Timers};
#[allow(unused_imports)]
pub use logging::init_tracing;
