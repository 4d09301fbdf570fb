//! Tracing subscriber setup for the `mdnav` binary.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Environment variable holding the log filter directives.
pub const LOG_ENV: &str = "MDNAV_LOG";

const DEFAULT_FILTER: &str = "info";

/// Build the filter from `MDNAV_LOG`, falling back to `info` when the
/// variable is unset or unparsable.
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the global subscriber: human-readable events on stderr, so stdout
/// stays reserved for command output and the serve banner.
///
/// A second call is a no-op.
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init();
}
