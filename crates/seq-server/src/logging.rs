//! Logging setup using `tracing` + `tracing-subscriber`.
//!
//! Logs go to stderr so that command output on stdout stays clean.

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

/// Initialise the global subscriber with an `EnvFilter` directive string.
///
/// Call once at startup.
pub fn init_logging(filter: &str) -> Result<()> {
    let filter =
        EnvFilter::try_new(filter).with_context(|| format!("invalid log filter '{filter}'"))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow::anyhow!("failed to initialise logging: {err}"))
}
