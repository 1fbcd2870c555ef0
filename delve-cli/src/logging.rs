//! Diagnostics on stderr via `tracing`.
//!
//! Answers go to stdout and records to the results file; nothing here is
//! part of the product output.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the subscriber.
///
/// `RUST_LOG` wins when set. Otherwise the level is `warn`, or `info` with
/// `--verbose`.
///
/// ```bash
/// RUST_LOG=delve_agent=debug delve --question "..."
/// ```
pub fn init(verbose: bool) {
    let fallback = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
