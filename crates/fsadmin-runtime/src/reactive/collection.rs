#![forbid(unsafe_code)]

//! Unkeyed observable collection of boxed values.
//!
//! # Design
//!
//! [`ObservableCollection<T>`] stores values in a [`BoxArena`] next to the
//! sequence of their [`BoxId`]s. It is mutated only through `add`, `remove`,
//! `reset`, `modify` and `update(delta)`; each mutation that changes
//! something raises exactly one [`CollectionChange`].
//!
//! # Invariants
//!
//! 1. The arena and the sequence always hold the same set of ids.
//! 2. New boxes are appended, so sequence order equals id order.
//! 3. `reset` invalidates every previous box.
//! 4. A mutation requested from inside one of this collection's own change
//!    handlers is deferred (or rejected) per [`ReentrancyPolicy`].
//!
//! # Failure Modes
//!
//! - Removing an id that is not live is ignored and logged.
//! - A mutation that changes nothing raises nothing.

use std::cell::RefCell;
use std::rc::Rc;

use ahash::AHashSet;
use fsadmin_core::ReentrancyPolicy;

use super::boxed::{BoxArena, BoxId};
use super::change::CollectionChange;
use super::deferred::DeferredQueue;
use super::delta::{Delta, DeltaKind};
use super::observable::{Observable, Subscription};
use super::source::CollectionSource;

/// Arena plus sequence; shared by the keyed and unkeyed collections.
#[derive(Debug)]
pub(crate) struct Slots<T> {
    pub(crate) arena: BoxArena<T>,
    pub(crate) order: Vec<BoxId>,
}

impl<T> Default for Slots<T> {
    fn default() -> Self {
        Self {
            arena: BoxArena::new(),
            order: Vec::new(),
        }
    }
}

impl<T> Slots<T> {
    pub(crate) fn append(&mut self, id: BoxId, value: T) {
        self.arena.insert(id, value);
        self.order.push(id);
    }

    /// Remove the live ids among `ids`; returns them with their values in
    /// sequence order.
    pub(crate) fn remove_many(&mut self, ids: &[BoxId]) -> Vec<(BoxId, T)> {
        let doomed: AHashSet<BoxId> = ids
            .iter()
            .copied()
            .filter(|id| self.arena.contains(*id))
            .collect();
        if doomed.is_empty() {
            return Vec::new();
        }
        let mut removed = Vec::with_capacity(doomed.len());
        let arena = &mut self.arena;
        self.order.retain(|id| {
            if doomed.contains(id) {
                if let Some(value) = arena.remove(*id) {
                    removed.push((*id, value));
                }
                false
            } else {
                true
            }
        });
        removed
    }

    pub(crate) fn clear(&mut self) {
        self.arena.clear();
        self.order.clear();
    }
}

struct CollectionInner<T> {
    slots: RefCell<Slots<T>>,
    changed: Observable<CollectionChange>,
    queue: DeferredQueue,
}

/// Observable sequence of boxed values without a key selector.
pub struct ObservableCollection<T> {
    inner: Rc<CollectionInner<T>>,
}

impl<T> Clone for ObservableCollection<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> std::fmt::Debug for ObservableCollection<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObservableCollection")
            .field("count", &self.inner.slots.borrow().order.len())
            .field("subscribers", &self.inner.changed.subscriber_count())
            .finish()
    }
}

impl<T: 'static> Default for ObservableCollection<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> From<Vec<T>> for ObservableCollection<T> {
    fn from(values: Vec<T>) -> Self {
        Self::from_values(values)
    }
}

impl<T: 'static> ObservableCollection<T> {
    /// Empty collection with the default re-entrancy policy.
    #[must_use]
    pub fn new() -> Self {
        Self::with_policy(ReentrancyPolicy::default())
    }

    /// Empty collection with an explicit re-entrancy policy.
    #[must_use]
    pub fn with_policy(policy: ReentrancyPolicy) -> Self {
        Self {
            inner: Rc::new(CollectionInner {
                slots: RefCell::new(Slots::default()),
                changed: Observable::new(),
                queue: DeferredQueue::new("ObservableCollection", policy),
            }),
        }
    }

    /// Collection pre-filled with `values`, without raising anything.
    pub fn from_values(values: impl IntoIterator<Item = T>) -> Self {
        let this = Self::new();
        {
            let mut slots = this.inner.slots.borrow_mut();
            for value in values {
                slots.append(BoxId::next(), value);
            }
        }
        this
    }

    /// Append `items`, raising one `Add`. Returns the new boxes.
    ///
    /// If called from inside a change handler the ids are issued now and
    /// the boxes become live once the handler returns.
    pub fn add(&self, items: impl IntoIterator<Item = T>) -> Vec<BoxId> {
        let staged: Vec<(BoxId, T)> = items.into_iter().map(|v| (BoxId::next(), v)).collect();
        let ids: Vec<BoxId> = staged.iter().map(|(id, _)| *id).collect();
        let this = self.clone();
        self.inner
            .queue
            .run_or_defer(move || this.commit(staged, Vec::new()));
        ids
    }

    /// Remove `ids`, raising one `Remove` for those that were live.
    pub fn remove(&self, ids: &[BoxId]) {
        let ids = ids.to_vec();
        let this = self.clone();
        self.inner
            .queue
            .run_or_defer(move || this.commit(Vec::new(), ids));
    }

    /// Replace the contents with `items`, raising one `Reset`.
    pub fn reset(&self, items: impl IntoIterator<Item = T>) -> Vec<BoxId> {
        let staged: Vec<(BoxId, T)> = items.into_iter().map(|v| (BoxId::next(), v)).collect();
        let ids: Vec<BoxId> = staged.iter().map(|(id, _)| *id).collect();
        let this = self.clone();
        self.inner.queue.run_or_defer(move || this.apply_reset(staged));
        ids
    }

    /// Edit the value behind `id` in place, raising one `Update`.
    pub fn modify(&self, id: BoxId, f: impl FnOnce(&mut T) + 'static) {
        let this = self.clone();
        self.inner.queue.run_or_defer(move || {
            let found = match this.inner.slots.borrow_mut().arena.get_mut(id) {
                Some(value) => {
                    f(value);
                    true
                }
                None => false,
            };
            if !found {
                tracing::warn!(%id, "modify of a box that is not in the collection");
                return;
            }
            if let Some(change) = CollectionChange::classify(Vec::new(), Vec::new(), vec![id]) {
                this.emit(&change);
            }
        });
    }

    /// Number of live boxes.
    #[must_use]
    pub fn count(&self) -> usize {
        self.inner.slots.borrow().order.len()
    }

    /// Whether the collection is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Snapshot of the live boxes in order. Call again to restart.
    #[must_use]
    pub fn values(&self) -> std::vec::IntoIter<BoxId> {
        self.inner.slots.borrow().order.clone().into_iter()
    }

    /// Borrow the value behind `id`.
    pub fn with<R>(&self, id: BoxId, f: impl FnOnce(&T) -> R) -> Option<R> {
        self.inner.slots.borrow().arena.get(id).map(f)
    }

    /// Listen for change events.
    pub fn subscribe(&self, callback: impl Fn(&CollectionChange) + 'static) -> Subscription {
        self.inner.changed.subscribe(callback)
    }

    fn commit(&self, added: Vec<(BoxId, T)>, removed: Vec<BoxId>) {
        let change = {
            let mut slots = self.inner.slots.borrow_mut();
            let gone: Vec<BoxId> = slots
                .remove_many(&removed)
                .into_iter()
                .map(|(id, _)| id)
                .collect();
            if gone.len() < removed.len() {
                tracing::warn!(
                    requested = removed.len(),
                    removed = gone.len(),
                    "remove ignored boxes that are not in the collection"
                );
            }
            let new_ids: Vec<BoxId> = added.iter().map(|(id, _)| *id).collect();
            for (id, value) in added {
                slots.append(id, value);
            }
            CollectionChange::classify(new_ids, gone, Vec::new())
        };
        if let Some(change) = change {
            tracing::trace!(
                kind = ?change.kind,
                added = change.new_items.len(),
                removed = change.old_items.len(),
                "collection changed"
            );
            self.emit(&change);
        }
    }

    fn apply_reset(&self, staged: Vec<(BoxId, T)>) {
        let change = {
            let mut slots = self.inner.slots.borrow_mut();
            slots.clear();
            for (id, value) in staged {
                slots.append(id, value);
            }
            CollectionChange::reset(slots.order.clone())
        };
        tracing::debug!(count = change.new_items.len(), "collection reset");
        self.emit(&change);
    }

    fn emit(&self, change: &CollectionChange) {
        self.inner.queue.notify(|| self.inner.changed.raise(change));
    }
}

impl<T: Clone + 'static> ObservableCollection<T> {
    /// Clone of the value behind `id`.
    #[must_use]
    pub fn get(&self, id: BoxId) -> Option<T> {
        self.with(id, T::clone)
    }
}

impl<T: PartialEq + 'static> ObservableCollection<T> {
    /// Apply a wire delta. `OldItems` are matched by equality, first
    /// unmatched live box wins.
    pub fn update(&self, delta: Delta<T>) {
        match delta.kind {
            DeltaKind::Reset => {
                self.reset(delta.new_items);
            }
            DeltaKind::Add | DeltaKind::Remove | DeltaKind::AddAndRemove => {
                let staged: Vec<(BoxId, T)> = delta
                    .new_items
                    .into_iter()
                    .map(|v| (BoxId::next(), v))
                    .collect();
                let old_items = delta.old_items;
                let this = self.clone();
                self.inner.queue.run_or_defer(move || {
                    let matched = this.match_values(&old_items);
                    this.commit(staged, matched);
                });
            }
        }
    }

    fn match_values(&self, values: &[T]) -> Vec<BoxId> {
        let slots = self.inner.slots.borrow();
        let mut taken = AHashSet::new();
        let mut matched = Vec::with_capacity(values.len());
        for wanted in values {
            let hit = slots.order.iter().copied().find(|id| {
                !taken.contains(id) && slots.arena.get(*id).is_some_and(|v| v == wanted)
            });
            match hit {
                Some(id) => {
                    taken.insert(id);
                    matched.push(id);
                }
                None => tracing::warn!("remove delta names a value that is not in the collection"),
            }
        }
        matched
    }
}

impl<T: 'static> CollectionSource for ObservableCollection<T> {
    type Item = T;
    type Key = BoxId;

    fn values(&self) -> Vec<BoxId> {
        self.inner.slots.borrow().order.clone()
    }

    fn count(&self) -> usize {
        ObservableCollection::count(self)
    }

    fn contains(&self, id: BoxId) -> bool {
        self.inner.slots.borrow().arena.contains(id)
    }

    fn read<R>(&self, f: impl FnOnce(&BoxArena<T>) -> R) -> R {
        f(&self.inner.slots.borrow().arena)
    }

    fn box_by_key(&self, key: &BoxId) -> Option<BoxId> {
        CollectionSource::contains(self, *key).then_some(*key)
    }

    fn subscribe(&self, callback: impl Fn(&CollectionChange) + 'static) -> Subscription {
        ObservableCollection::subscribe(self, callback)
    }
}
