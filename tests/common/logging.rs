//! Test logging.
//!
//! Routes the scheduler's `tracing` events through the libtest capture
//! writer, so they only show up for failing tests. Set `RUST_LOG` (for
//! example `RUST_LOG=reactor_timers=trace`) to see them.

#![allow(dead_code)]

use std::sync::OnceLock;

use tracing_subscriber::EnvFilter;

static INIT: OnceLock<()> = OnceLock::new();

/// Install the global subscriber once per test binary.
pub fn init_tracing() {
    INIT.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("reactor_timers=debug"));
        // Another test binary harness may already have installed one.
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(false)
            .try_init();
    });
}
