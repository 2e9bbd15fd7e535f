//! Tracing initialization helpers.

use tracing_subscriber::EnvFilter;

/// Installs a global `tracing` subscriber with env-filter support.
///
/// Filtering follows `RUST_LOG` (e.g. `RUST_LOG=docsmith=debug`); defaults to
/// `info` when unset. Safe to call more than once; later calls are no-ops.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
