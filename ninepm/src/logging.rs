//! Development-time tracing for debugging the orchestrator.
//!
//! # Separation of Concerns
//!
//! - **Tracing (this module)**: Dev diagnostics via `RUST_LOG`, output to stderr.
//!   Not part of the product output.
//!
//! - **Console (`io/console`)**: Banner, echoed case output and the result
//!   tree on stdout. Always written, unaffected by `RUST_LOG`.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing subscriber for development logging.
///
/// Reads `RUST_LOG` env var. Defaults to `warn` if unset, or `ninepm=debug`
/// when `debug` is set.
/// Output: stderr, compact format.
///
/// # Example
/// ```bash
/// RUST_LOG=ninepm=trace ninepm suites/all.yaml
/// ```
pub fn init(debug: bool) {
    let default = if debug { "ninepm=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
