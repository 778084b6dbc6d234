//! Load testing integration tests.
//!
//! These tests drive the dispatcher end to end against the simulated broker
//! (and, for dry runs, the real command entry point without any network
//! access). Each test:
//! 1. Builds jobs or arguments for one or more brokers
//! 2. Runs the populate step to completion
//! 3. Checks per-broker outcomes and the run report

mod dispatch_loadtest;
mod dry_run_loadtest;

/// Install a test subscriber once; later calls are no-ops.
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}
