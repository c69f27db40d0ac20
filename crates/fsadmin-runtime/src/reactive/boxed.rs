#![forbid(unsafe_code)]

//! Identity handles for collection items.
//!
//! A [`BoxId`] is the stable handle a collection issues for each item it
//! stores. Equality and hashing are by handle, never by the item's content,
//! so a row keeps its identity while its record is edited in place. The item
//! itself lives in a [`BoxArena`] owned by the collection; views and
//! selection sets only hold ids and look values up through the source.
//!
//! Ids are issued from a process-wide monotonic counter. Within one
//! collection, items are only ever appended, so comparing ids reproduces the
//! collection's sequence order.

use std::sync::atomic::{AtomicU64, Ordering};

use ahash::AHashMap;

static BOX_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Opaque identity of one stored item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BoxId(u64);

impl BoxId {
    /// Issue a fresh, never-before-seen id.
    pub(crate) fn next() -> Self {
        Self(BOX_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw id value, for logging.
    #[inline]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for BoxId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "box#{}", self.0)
    }
}

/// Side table from [`BoxId`] to the boxed value.
#[derive(Debug, Clone)]
pub struct BoxArena<T> {
    slots: AHashMap<BoxId, T>,
}

impl<T> Default for BoxArena<T> {
    fn default() -> Self {
        Self {
            slots: AHashMap::new(),
        }
    }
}

impl<T> BoxArena<T> {
    /// Empty arena.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under a pre-issued id.
    pub(crate) fn insert(&mut self, id: BoxId, value: T) {
        self.slots.insert(id, value);
    }

    /// Drop the value behind `id`, returning it.
    pub(crate) fn remove(&mut self, id: BoxId) -> Option<T> {
        self.slots.remove(&id)
    }

    pub(crate) fn get_mut(&mut self, id: BoxId) -> Option<&mut T> {
        self.slots.get_mut(&id)
    }

    pub(crate) fn clear(&mut self) {
        self.slots.clear();
    }

    /// Borrow the value behind `id`.
    #[must_use]
    pub fn get(&self, id: BoxId) -> Option<&T> {
        self.slots.get(&id)
    }

    /// Whether `id` is live in this arena.
    #[must_use]
    pub fn contains(&self, id: BoxId) -> bool {
        self.slots.contains_key(&id)
    }

    /// Number of live boxes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the arena holds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
