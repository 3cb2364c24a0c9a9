//! Logging setup.
//!
//! ## Log Levels
//! - `RUST_LOG=debug` - Show debug messages everywhere
//! - `RUST_LOG=furnish_db=trace` - Trace the database layer only
//! - Otherwise the configured `log_filter` (default `info,furnish=debug,sqlx=warn`)

use tracing_subscriber::EnvFilter;

/// Installs the global `tracing` subscriber.
///
/// Fails if a subscriber is already installed.
pub fn init(log_filter: &str, json: bool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter(log_filter))
        .with_target(true);

    if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    }
}

/// RUST_LOG wins over the configured directives.
fn env_filter(log_filter: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_filter))
}
