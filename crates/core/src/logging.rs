//! Logging initialization and configuration.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the logging system with tracing.
///
/// This sets up tracing-subscriber with:
/// - Environment-based filtering (RUST_LOG)
/// - Pretty printing for development
///
/// # Example
/// ```
/// prism_core::init_logging();
/// tracing::info!("Engine initialized");
/// ```
pub fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,prism=debug"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .init();
}
