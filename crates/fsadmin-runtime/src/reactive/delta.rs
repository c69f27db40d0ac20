#![forbid(unsafe_code)]

//! Wire shape of collection deltas produced by the transport layer.
//!
//! Producers emit `{"Type": ..., "NewItems": [...], "OldItems": [...]}`,
//! keyed consistently with the receiving collection's key selector.
//!
//! ```
//! use fsadmin_runtime::reactive::{Delta, DeltaKind};
//! use serde::Deserialize;
//!
//! #[derive(Debug, Deserialize)]
//! struct Player {
//!     name: String,
//! }
//!
//! let delta: Delta<Player> =
//!     Delta::from_json(r#"{"Type":"Add","NewItems":[{"name":"ann"}]}"#).unwrap();
//! assert_eq!(delta.kind, DeltaKind::Add);
//! assert_eq!(delta.new_items.len(), 1);
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Kind tag of a wire delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeltaKind {
    Add,
    Remove,
    Reset,
    AddAndRemove,
}

/// A collection delta as received from a producer.
///
/// For keyed collections, `new_items` whose key already exists replace the
/// existing value in place and `old_items` are matched by key. For unkeyed
/// collections, `old_items` are matched by equality.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delta<T> {
    #[serde(rename = "Type")]
    pub kind: DeltaKind,
    #[serde(rename = "NewItems", default = "Vec::new")]
    pub new_items: Vec<T>,
    #[serde(rename = "OldItems", default = "Vec::new")]
    pub old_items: Vec<T>,
}

/// Errors from decoding a wire delta.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum DeltaError {
    /// The payload is not valid JSON for this delta shape.
    #[error("malformed delta: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The delta kind requires an item list the payload did not carry.
    #[error("{kind:?} delta is missing {field}")]
    MissingItems {
        kind: DeltaKind,
        field: &'static str,
    },
}

#[derive(Deserialize)]
struct RawDelta<T> {
    #[serde(rename = "Type")]
    kind: DeltaKind,
    #[serde(rename = "NewItems")]
    new_items: Option<Vec<T>>,
    #[serde(rename = "OldItems")]
    old_items: Option<Vec<T>>,
}

impl<T> Delta<T> {
    /// Append (or, for keyed collections, upsert) `items`.
    pub fn add(items: impl IntoIterator<Item = T>) -> Self {
        Self {
            kind: DeltaKind::Add,
            new_items: items.into_iter().collect(),
            old_items: Vec::new(),
        }
    }

    /// Remove `items`.
    pub fn remove(items: impl IntoIterator<Item = T>) -> Self {
        Self {
            kind: DeltaKind::Remove,
            new_items: Vec::new(),
            old_items: items.into_iter().collect(),
        }
    }

    /// Replace the whole contents with `items`.
    pub fn reset(items: impl IntoIterator<Item = T>) -> Self {
        Self {
            kind: DeltaKind::Reset,
            new_items: items.into_iter().collect(),
            old_items: Vec::new(),
        }
    }

    /// Remove `old` and add `new` as one change.
    pub fn add_and_remove(
        new: impl IntoIterator<Item = T>,
        old: impl IntoIterator<Item = T>,
    ) -> Self {
        Self {
            kind: DeltaKind::AddAndRemove,
            new_items: new.into_iter().collect(),
            old_items: old.into_iter().collect(),
        }
    }

    /// Whether applying the delta could change anything.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.kind != DeltaKind::Reset && self.new_items.is_empty() && self.old_items.is_empty()
    }
}

impl<T: for<'de> Deserialize<'de>> Delta<T> {
    /// Decode and validate a JSON delta.
    ///
    /// `Add` requires `NewItems`, `Remove` requires `OldItems`,
    /// `AddAndRemove` requires at least one of them. A `Reset` without
    /// `NewItems` clears the collection.
    pub fn from_json(input: &str) -> Result<Self, DeltaError> {
        let raw: RawDelta<T> = serde_json::from_str(input)?;
        let missing = |field| DeltaError::MissingItems {
            kind: raw.kind,
            field,
        };
        match raw.kind {
            DeltaKind::Add if raw.new_items.is_none() => return Err(missing("NewItems")),
            DeltaKind::Remove if raw.old_items.is_none() => return Err(missing("OldItems")),
            DeltaKind::AddAndRemove if raw.new_items.is_none() && raw.old_items.is_none() => {
                return Err(missing("NewItems/OldItems"));
            }
            _ => {}
        }
        Ok(Self {
            kind: raw.kind,
            new_items: raw.new_items.unwrap_or_default(),
            old_items: raw.old_items.unwrap_or_default(),
        })
    }
}
