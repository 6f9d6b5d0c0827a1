//! Logging setup for the syneplayer binary.

use anyhow::{anyhow, Context, Result};
use tracing_subscriber::EnvFilter;

/// Install a fmt subscriber filtered by `directives` (e.g. `info` or
/// `syneplayer=debug,syneproto=trace`). Logs go to stderr so stdout stays
/// clean for `syneplayer config` and `syneplayer status`.
pub fn init(directives: &str) -> Result<()> {
    let filter = EnvFilter::try_new(directives)
        .with_context(|| format!("Invalid log filter '{}'", directives))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow!(e))
}
