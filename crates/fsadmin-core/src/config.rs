#![forbid(unsafe_code)]

//! Engine configuration loaded from TOML or JSON.
//!
//! Every field has a default, so an empty document is a valid configuration.
//!
//! ```
//! use fsadmin_core::{EngineConfig, ReentrancyPolicy, SelectionMode};
//!
//! let config = EngineConfig::from_toml_str(
//!     r#"
//!     selection_mode = "multiple"
//!
//!     [log]
//!     filter = "fsadmin_runtime=debug"
//!     "#,
//! )
//! .unwrap();
//! assert_eq!(config.selection_mode, SelectionMode::Multiple);
//! assert_eq!(config.reentrancy, ReentrancyPolicy::Defer);
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Selection cardinality of a collection view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMode {
    /// At most one box selected at a time.
    #[default]
    Single,
    /// Any subset of the visible boxes may be selected.
    Multiple,
}

/// Direction of a single sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    /// The opposite direction.
    #[must_use]
    pub const fn flipped(self) -> Self {
        match self {
            Self::Ascending => Self::Descending,
            Self::Descending => Self::Ascending,
        }
    }

    /// `true` for [`SortDirection::Ascending`].
    #[must_use]
    pub const fn is_ascending(self) -> bool {
        matches!(self, Self::Ascending)
    }
}

/// What a collection or view does when it is mutated from inside one of its
/// own change handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReentrancyPolicy {
    /// Queue the mutation and apply it once the in-flight notification ends.
    #[default]
    Defer,
    /// Panic with a description of the offending mutation.
    Panic,
}

/// Logging setup consumed by [`crate::logging::init`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// `EnvFilter` directive string. `RUST_LOG` overrides it when set.
    pub filter: String,
    /// Emit JSON lines instead of the human-readable format.
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_owned(),
            json: false,
        }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Selection mode for newly created collection views.
    pub selection_mode: SelectionMode,
    /// Direction used when a view sorts by a key without naming one.
    pub default_direction: SortDirection,
    /// Handling of re-entrant mutation during change notification.
    pub reentrancy: ReentrancyPolicy,
    /// Logging setup.
    pub log: LogConfig,
}

impl EngineConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a JSON document.
    pub fn from_json_str(input: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file. Files ending in `.json` are parsed as
    /// JSON; anything else is parsed as TOML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let config = if is_json {
            Self::from_json_str(&text)?
        } else {
            Self::from_toml_str(&text)?
        };
        tracing::debug!(path = %path.display(), ?config, "loaded engine config");
        Ok(config)
    }

    /// Reject values that parse but cannot be used.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.log.filter.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "log.filter",
                reason: "filter must not be empty".to_owned(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_toml_yields_defaults() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.selection_mode, SelectionMode::Single);
        assert_eq!(config.log.filter, "info");
    }

    #[test]
    fn toml_overrides_fields() {
        let config = EngineConfig::from_toml_str(
            r#"
            selection_mode = "multiple"
            default_direction = "descending"
            reentrancy = "panic"

            [log]
            json = true
            "#,
        )
        .unwrap();
        assert_eq!(config.selection_mode, SelectionMode::Multiple);
        assert_eq!(config.default_direction, SortDirection::Descending);
        assert_eq!(config.reentrancy, ReentrancyPolicy::Panic);
        assert!(config.log.json);
        assert_eq!(config.log.filter, "info", "unset nested field keeps default");
    }

    #[test]
    fn json_round_trips_through_serde() {
        let config = EngineConfig {
            selection_mode: SelectionMode::Multiple,
            ..EngineConfig::default()
        };
        let text = serde_json::to_string(&config).unwrap();
        assert_eq!(EngineConfig::from_json_str(&text).unwrap(), config);
    }

    #[test]
    fn unknown_variant_is_a_parse_error() {
        let err = EngineConfig::from_toml_str(r#"selection_mode = "many""#).unwrap_err();
        assert!(err.is_parse_error());
    }

    #[test]
    fn empty_filter_is_rejected() {
        let err = EngineConfig::from_json_str(r#"{"log": {"filter": "  "}}"#).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "log.filter",
                ..
            }
        ));
    }

    #[test]
    fn load_picks_parser_by_extension() {
        let dir = tempfile::tempdir().unwrap();

        let json_path = dir.path().join("engine.json");
        let mut file = fs::File::create(&json_path).unwrap();
        write!(file, r#"{{"selection_mode": "multiple"}}"#).unwrap();
        let config = EngineConfig::load(&json_path).unwrap();
        assert_eq!(config.selection_mode, SelectionMode::Multiple);

        let toml_path = dir.path().join("engine.toml");
        fs::write(&toml_path, "reentrancy = \"panic\"\n").unwrap();
        let config = EngineConfig::load(&toml_path).unwrap();
        assert_eq!(config.reentrancy, ReentrancyPolicy::Panic);
    }

    #[test]
    fn load_missing_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        let err = EngineConfig::load(&missing).unwrap_err();
        match err {
            ConfigError::Io { path, .. } => assert_eq!(path, missing),
            other => panic!("expected Io error, got {other:?}"),
        }
    }

    #[test]
    fn direction_flips() {
        assert_eq!(SortDirection::Ascending.flipped(), SortDirection::Descending);
        assert!(SortDirection::default().is_ascending());
    }
}
