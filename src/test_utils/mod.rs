//! Test utilities shared by unit and integration tests.
//!
//! Available with `cfg(test)` or the `test-utils` feature, which the integration
//! suite enables through the self dev-dependency.

pub mod builder;

pub use builder::{TestEnvironment, TestEnvironmentBuilder};

use std::sync::Once;
use tracing::Level;
use tracing_subscriber::EnvFilter;

static INIT_LOGGING: Once = Once::new();

/// Install a test-friendly `tracing` subscriber once per process.
///
/// With `level` the filter is that level; otherwise `RUST_LOG` is honored and
/// logging stays off when it is unset.
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .try_init();
    });
}
