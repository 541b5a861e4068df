//! Tracing setup for hosts embedding the cache
//!
//! Library code only emits `tracing` events; the host decides whether to call
//! [`init_logging`] or install its own subscriber.

use std::sync::Once;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

static INIT: Once = Once::new();

/// Filter used when `RUST_LOG` is unset or invalid
pub const DEFAULT_FILTER: &str = "info,arena_cache=debug";

/// Install a stderr subscriber filtered by `RUST_LOG`.
///
/// Safe to call repeatedly; an already installed global subscriber is left alone.
pub fn init_logging() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

        let result = tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true),
            )
            .try_init();

        match result {
            Ok(()) => tracing::debug!("Logging initialized"),
            Err(e) => eprintln!("[arena-cache] tracing subscriber not installed: {}", e),
        }
    });
}
