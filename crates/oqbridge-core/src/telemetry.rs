//! Logging initialization shared by both binaries.

use crate::config::LoggingConfig;
use tracing_subscriber::EnvFilter;

/// Initializes the global tracing subscriber from the logging config.
/// A `RUST_LOG` environment variable takes precedence over the configured
/// level when set.
pub fn init(cfg: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cfg.level.clone()));

    if cfg.format == "json" {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
