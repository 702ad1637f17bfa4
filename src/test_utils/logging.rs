//! Test log capture.

use std::sync::Once;

use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

/// Route `tracing` output through the test harness writer.
///
/// Honors `RUST_LOG`; defaults to `skillsync=debug`. Safe to call from
/// every test.
pub fn init_test_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("skillsync=debug"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}
