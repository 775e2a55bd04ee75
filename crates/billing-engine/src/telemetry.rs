//! # Telemetry
//!
//! Structured logging setup for processes that drive invoice runs.
//!
//! ## Log Levels
//! - `RUST_LOG=debug` - Show debug messages
//! - `RUST_LOG=billing_core=trace` - Trace the pure pipeline only
//! - Default: `info,billing=debug,sqlx=warn`

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info,billing=debug,sqlx=warn";

/// Installs the global fmt subscriber.
///
/// Returns `false` when a subscriber was already installed (tests, or a
/// host application that set up its own).
pub fn init_tracing() -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}
