//! Diagnostic logging via tracing

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable overriding the log filter, e.g. `ECOMLENS_LOG=debug`
pub const LOG_ENV: &str = "ECOMLENS_LOG";

/// Install the global subscriber. Logs go to stderr so the dashboard pages on
/// stdout stay clean; a second call is a no-op.
pub fn init_tracing(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .try_init();
}
