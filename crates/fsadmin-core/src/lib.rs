#![forbid(unsafe_code)]

//! Shared configuration, logging, and policy types for the fsadmin engine.
//!
//! The reactive runtime (`fsadmin-runtime`) does no I/O. All
//! of the ambient setup an embedding admin application needs lives here:
//!
//! - [`EngineConfig`]: defaults for new collection views and the re-entrancy
//!   policy, loadable from TOML or JSON.
//! - [`logging::init`]: installs a `tracing` subscriber described by
//!   [`LogConfig`].
//! - [`ConfigError`]: the error type for everything above.

pub mod config;
pub mod error;
pub mod logging;

pub use config::{EngineConfig, LogConfig, ReentrancyPolicy, SelectionMode, SortDirection};
pub use error::ConfigError;
