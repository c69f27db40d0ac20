#![forbid(unsafe_code)]

//! Reactive engine behind the Factorio server admin UI.
//!
//! See [`reactive`] for the primitives. Configuration and logging setup live
//! in [`fsadmin_core`] and are re-exported here for convenience.

pub mod reactive;

pub use fsadmin_core::{EngineConfig, ReentrancyPolicy, SelectionMode, SortDirection};
