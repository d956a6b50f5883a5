//! Logging configuration
//!
//! Structured logging with tracing. `RUST_LOG` overrides the defaults.

use tracing::Level;
use tracing_subscriber::fmt;
use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset
const DEFAULT_FILTER: &str = "torembed=info";

/// Initialize logging with environment-based filtering
pub fn init() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

/// Initialize logging at `level` unless `RUST_LOG` says otherwise
pub fn init_with_level(level: Level) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("torembed={}", level)));

    fmt().with_env_filter(filter).with_target(true).init();
}
