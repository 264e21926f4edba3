//! Logging initialization.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Filter used when `RUST_LOG` is not set.
const DEFAULT_FILTER: &str = "info,shadertoy=debug,shadertoy_renderer=debug,shadertoy_rhi=info";

/// Initialize the logging system with tracing.
///
/// Filtering follows `RUST_LOG` when present. Call once, before the event loop
/// starts; a second call panics inside `tracing_subscriber`.
///
/// # Example
/// ```
/// shadertoy_core::init_logging();
/// tracing::info!("Shadertoy starting");
/// ```
pub fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .init();
}
