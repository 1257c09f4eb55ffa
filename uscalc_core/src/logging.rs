//! Tracing setup for the uscalc binary.
//!
//! Events go to stderr. Stdout is reserved for readouts, CSV and cached
//! bodies, which callers pipe into other tools.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Level used when RUST_LOG is unset and `--verbose` is off
pub const QUIET_LEVEL: &str = "warn";

/// Level used for `--verbose`
pub const VERBOSE_LEVEL: &str = "debug";

/// Default filter directive for the given verbosity
pub fn default_level(verbose: bool) -> &'static str {
    if verbose {
        VERBOSE_LEVEL
    } else {
        QUIET_LEVEL
    }
}

/// Install the global subscriber
///
/// RUST_LOG wins over `verbose` when set.
pub fn init(verbose: bool) {
    init_with_level(default_level(verbose))
}

/// Install the global subscriber with an explicit default directive
pub fn init_with_level(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .compact()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .try_init();

    if installed.is_err() {
        tracing::debug!("Subscriber already installed; keeping it");
    }
}

#[cfg(test)]
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(EnvFilter::new(VERBOSE_LEVEL))
        .try_init();
}
