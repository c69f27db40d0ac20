#![forbid(unsafe_code)]

//! Installation of the process-wide `tracing` subscriber.
//!
//! Library code only emits events through the `tracing` macros; the binary
//! that embeds the engine calls [`init`] once at startup.

use tracing_subscriber::EnvFilter;

use crate::config::LogConfig;
use crate::error::ConfigError;

/// Build the filter for `config`, letting `RUST_LOG` take precedence.
pub fn env_filter(config: &LogConfig) -> Result<EnvFilter, ConfigError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(&config.filter)
        .map_err(|err| ConfigError::Logging(format!("bad filter {:?}: {err}", config.filter)))
}

/// Install a `fmt` subscriber described by `config`.
///
/// Fails instead of panicking when a global subscriber is already set.
pub fn init(config: &LogConfig) -> Result<(), ConfigError> {
    let filter = env_filter(config)?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let result = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    result.map_err(|err| ConfigError::Logging(err.to_string()))?;
    tracing::debug!(filter = %config.filter, json = config.json, "logging initialized");
    Ok(())
}
