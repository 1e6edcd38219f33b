//! Test infrastructure for the yangconf transaction engine
//!
//! Provides:
//! - Configuration tree and schema fixtures
//! - Recording subscribers with scripted failures
//! - A scripted resource monitor
//! - Call-sequence and diff verification helpers

pub mod fixtures;
mod monitor;
mod recorder;
mod verification;

pub use monitor::{MonitorCall, ScriptedMonitor};
pub use recorder::{Call, CallLog, RecordingSubscriber};
pub use verification::*;

use tracing_subscriber::EnvFilter;

/// Installs a test-friendly tracing subscriber once per test binary.
///
/// Honors `RUST_LOG`; defaults to `warn` so transaction events show up in
/// failing test output.
pub fn init_test_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_test_writer()
        .try_init();
}
