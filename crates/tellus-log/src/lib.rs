//! Structured logging for the globe terrain engine.
//!
//! Span-based, filterable logging via the `tracing` ecosystem: console
//! output with uptime timestamps and module paths, plus JSON file logging in
//! debug builds for post-mortem analysis of long refinement runs.

use std::path::Path;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_FILTER: &str = "info,tellus_mesh=info";

/// Initialize the tracing subscriber.
///
/// `RUST_LOG` takes precedence; otherwise `filter_override` is used when
/// given, falling back to the default filter. In debug builds with a
/// `log_dir`, a JSON file layer is added alongside the console.
pub fn init_logging(log_dir: Option<&Path>, debug_build: bool, filter_override: Option<&str>) {
    let fallback = filter_override.unwrap_or(DEFAULT_FILTER);
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(true)
        .with_level(true)
        .with_timer(fmt::time::uptime());

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer);

    if debug_build
        && let Some(log_dir) = log_dir
        && std::fs::create_dir_all(log_dir).is_ok()
        && let Ok(log_file) = std::fs::File::create(log_dir.join("tellus.log"))
    {
        let file_layer = fmt::layer()
            .with_writer(log_file)
            .with_ansi(false)
            .with_target(true)
            .with_timer(fmt::time::uptime())
            .json();

        subscriber.with(file_layer).init();
        return;
    }

    subscriber.init();
}

/// The default filter, for tests and embedders that build their own
/// subscriber stack.
pub fn default_env_filter() -> EnvFilter {
    EnvFilter::new(DEFAULT_FILTER)
}
