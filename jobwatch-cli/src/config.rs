//! Configuration module
//!
//! Builds the client configuration from the environment and CLI flags.

use anyhow::{Context, Result};
use jobwatch_client::config::Config;

/// The `--api-url` flag (which clap already falls back to `JOBWATCH_API_URL`
/// for) plus the optional tuning variables
pub fn load(api_url: String) -> Result<Config> {
    let config = Config::new(api_url).with_env_overrides();

    config.validate().context("Invalid configuration")?;
    tracing::debug!("Using job server at {}", config.api_url);

    Ok(config)
}
