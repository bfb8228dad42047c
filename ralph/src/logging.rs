//! Tracing setup for the driver.
//!
//! The level comes from the config's `loglevel`; `RUST_LOG`, when set, takes
//! precedence. Output goes to stderr in the compact format.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::core::types::LogLevel;

/// Initialize the global tracing subscriber. Call once, at process entry.
///
/// # Example
/// ```bash
/// RUST_LOG=ralph=debug ralph --config .ralph/config.json
/// ```
pub fn init(level: LogLevel) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
