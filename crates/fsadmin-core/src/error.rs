#![forbid(unsafe_code)]

//! Error type for configuration loading and logging setup.

use std::path::PathBuf;

use thiserror::Error;

/// Errors produced while loading [`EngineConfig`](crate::EngineConfig) or
/// installing the logging subscriber.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// TOML input did not match the configuration schema.
    #[error("invalid TOML config: {0}")]
    Toml(#[from] toml::de::Error),

    /// JSON input did not match the configuration schema.
    #[error("invalid JSON config: {0}")]
    Json(#[from] serde_json::Error),

    /// A field parsed but holds an unusable value.
    #[error("invalid value for '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },

    /// The tracing subscriber could not be installed, or its filter is malformed.
    #[error("failed to initialize logging: {0}")]
    Logging(String),
}

impl ConfigError {
    /// Whether the error came from parsing rather than from I/O or setup.
    #[must_use]
    pub fn is_parse_error(&self) -> bool {
        matches!(self, Self::Toml(_) | Self::Json(_))
    }
}
