//! Tracing output for tests.
//!
//! Call [`init_test_tracing`] at the top of a test to see the session's
//! `tracing` events. Filtering follows `RUST_LOG`, defaulting to `debug`
//! for `raid_core`.

use tracing_subscriber::EnvFilter;

/// Install a test-writer subscriber. Safe to call from every test.
pub fn init_test_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("raid_core=debug"));
    // Another test may already have installed one
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .with_target(false)
        .try_init();
}
