//! Logging initialization.
//!
//! Console logging through `tracing_subscriber` with an env-overridable
//! filter, plus an optional daily-rotated file appender.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Default log filter directive.
pub const DEFAULT_LOG_FILTER: &str = "podforge=info,sqlx=warn";

/// Initialize console-only logging.
///
/// The filter is taken from `RUST_LOG` when set, otherwise
/// [`DEFAULT_LOG_FILTER`] applies.
pub fn init() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Initialize logging with an additional daily-rotated log file.
///
/// Returns the appender guard; dropping it stops the background writer, so
/// the caller must hold it for the lifetime of the process.
pub fn init_with_file(log_dir: &Path) -> WorkerGuard {
    let file_appender = tracing_appender::rolling::daily(log_dir, "podforge.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(non_blocking),
        )
        .init();

    guard
}
