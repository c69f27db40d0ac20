#![forbid(unsafe_code)]

//! The read seam a [`CollectionView`](super::CollectionView) consumes.

use super::boxed::{BoxArena, BoxId};
use super::change::CollectionChange;
use super::observable::Subscription;

/// A mutable, observable sequence of boxes that views can project.
///
/// Implemented by [`ObservableCollection`](super::ObservableCollection)
/// (keyed by [`BoxId`]) and [`ObservableKeyArray`](super::ObservableKeyArray)
/// (keyed by its key selector). Implementations are cheap handles: cloning
/// shares the underlying collection.
pub trait CollectionSource: Clone + 'static {
    /// Value type stored in each box.
    type Item: 'static;
    /// Lookup key accepted by [`box_by_key`](Self::box_by_key).
    type Key;

    /// Live boxes in sequence order.
    fn values(&self) -> Vec<BoxId>;

    /// Number of live boxes.
    fn count(&self) -> usize;

    /// Whether `id` is live.
    fn contains(&self, id: BoxId) -> bool;

    /// Borrow the value table for the duration of `f`.
    fn read<R>(&self, f: impl FnOnce(&BoxArena<Self::Item>) -> R) -> R;

    /// Resolve `key` to its box.
    fn box_by_key(&self, key: &Self::Key) -> Option<BoxId>;

    /// Listen for normalized change events.
    fn subscribe(&self, callback: impl Fn(&CollectionChange) + 'static) -> Subscription;
}
