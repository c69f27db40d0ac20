#![forbid(unsafe_code)]

//! Keyed observable collection.
//!
//! [`ObservableKeyArray<K, T>`] is an [`ObservableCollection`] with a key
//! selector and a `key -> box` index. Adding an item whose key is already
//! present replaces the value of the existing box in place: identity is
//! kept, so selection and sort position of untouched rows survive.
//!
//! # Invariants
//!
//! 1. The key index and the sequence always agree.
//! 2. Every key maps to at most one live box.
//! 3. Each effective mutation raises exactly one [`CollectionChange`];
//!    replaced-in-place boxes are reported in `updated_items`.
//!
//! [`ObservableCollection`]: super::ObservableCollection

use std::cell::RefCell;
use std::hash::Hash;
use std::rc::Rc;

use ahash::AHashMap;
use fsadmin_core::ReentrancyPolicy;

use super::boxed::{BoxArena, BoxId};
use super::change::CollectionChange;
use super::collection::Slots;
use super::deferred::DeferredQueue;
use super::delta::{Delta, DeltaKind};
use super::observable::{Observable, Subscription};
use super::source::CollectionSource;

struct KeyState<K, T> {
    slots: Slots<T>,
    index: AHashMap<K, BoxId>,
}

struct KeyArrayInner<K, T> {
    state: RefCell<KeyState<K, T>>,
    key_of: Box<dyn Fn(&T) -> K>,
    changed: Observable<CollectionChange>,
    queue: DeferredQueue,
}

/// Observable sequence of boxed values addressed by a key.
pub struct ObservableKeyArray<K, T> {
    inner: Rc<KeyArrayInner<K, T>>,
}

impl<K, T> Clone for ObservableKeyArray<K, T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<K, T> std::fmt::Debug for ObservableKeyArray<K, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObservableKeyArray")
            .field("count", &self.inner.state.borrow().slots.order.len())
            .field("subscribers", &self.inner.changed.subscriber_count())
            .finish()
    }
}

/// Boxes touched by one upsert batch.
#[derive(Default)]
struct Upserted {
    added: Vec<BoxId>,
    updated: Vec<BoxId>,
}

impl<K: Eq + Hash + Clone + 'static, T: 'static> KeyState<K, T> {
    fn upsert(&mut self, key_of: &dyn Fn(&T) -> K, items: Vec<T>) -> Upserted {
        let mut out = Upserted::default();
        for item in items {
            let key = key_of(&item);
            if let Some(&id) = self.index.get(&key) {
                if let Some(slot) = self.slots.arena.get_mut(id) {
                    *slot = item;
                }
                if !out.added.contains(&id) && !out.updated.contains(&id) {
                    out.updated.push(id);
                }
            } else {
                let id = BoxId::next();
                self.slots.append(id, item);
                self.index.insert(key, id);
                out.added.push(id);
            }
        }
        out
    }

    fn remove_ids(&mut self, key_of: &dyn Fn(&T) -> K, ids: &[BoxId]) -> Vec<BoxId> {
        self.slots
            .remove_many(ids)
            .into_iter()
            .map(|(id, value)| {
                self.index.remove(&key_of(&value));
                id
            })
            .collect()
    }
}

impl<K: Eq + Hash + Clone + 'static, T: 'static> ObservableKeyArray<K, T> {
    /// Empty keyed collection using `key_of` as key selector.
    pub fn new(key_of: impl Fn(&T) -> K + 'static) -> Self {
        Self::with_policy(key_of, ReentrancyPolicy::default())
    }

    /// Empty keyed collection with an explicit re-entrancy policy.
    pub fn with_policy(key_of: impl Fn(&T) -> K + 'static, policy: ReentrancyPolicy) -> Self {
        Self {
            inner: Rc::new(KeyArrayInner {
                state: RefCell::new(KeyState {
                    slots: Slots::default(),
                    index: AHashMap::new(),
                }),
                key_of: Box::new(key_of),
                changed: Observable::new(),
                queue: DeferredQueue::new("ObservableKeyArray", policy),
            }),
        }
    }

    /// Append new keys and replace existing ones in place; raises one change.
    pub fn add(&self, items: impl IntoIterator<Item = T>) {
        let items: Vec<T> = items.into_iter().collect();
        let this = self.clone();
        self.inner
            .queue
            .run_or_defer(move || this.commit(Vec::new(), items));
    }

    /// Remove the boxes for `keys`. Unknown keys are ignored.
    pub fn remove_keys(&self, keys: impl IntoIterator<Item = K>) {
        let keys: Vec<K> = keys.into_iter().collect();
        let this = self.clone();
        self.inner.queue.run_or_defer(move || {
            let ids = this.resolve(&keys);
            this.commit(ids, Vec::new());
        });
    }

    /// Remove boxes by identity.
    pub fn remove(&self, ids: &[BoxId]) {
        let ids = ids.to_vec();
        let this = self.clone();
        self.inner
            .queue
            .run_or_defer(move || this.commit(ids, Vec::new()));
    }

    /// Replace the contents. Duplicate keys in `items` collapse, last wins.
    pub fn reset(&self, items: impl IntoIterator<Item = T>) {
        let items: Vec<T> = items.into_iter().collect();
        let this = self.clone();
        self.inner.queue.run_or_defer(move || {
            let change = {
                let mut state = this.inner.state.borrow_mut();
                state.slots.clear();
                state.index.clear();
                state.upsert(this.inner.key_of.as_ref(), items);
                CollectionChange::reset(state.slots.order.clone())
            };
            tracing::debug!(count = change.new_items.len(), "key array reset");
            this.emit(&change);
        });
    }

    /// Apply a wire delta. For `AddAndRemove`, removals are applied before
    /// additions, so a key present in both lists gets a fresh box.
    pub fn update(&self, delta: Delta<T>) {
        match delta.kind {
            DeltaKind::Reset => self.reset(delta.new_items),
            DeltaKind::Add | DeltaKind::Remove | DeltaKind::AddAndRemove => {
                let keys: Vec<K> = delta
                    .old_items
                    .iter()
                    .map(|item| (self.inner.key_of)(item))
                    .collect();
                let new_items = delta.new_items;
                let this = self.clone();
                self.inner.queue.run_or_defer(move || {
                    let ids = this.resolve(&keys);
                    this.commit(ids, new_items);
                });
            }
        }
    }

    /// Box currently holding `key`.
    #[must_use]
    pub fn get_box_by_key(&self, key: &K) -> Option<BoxId> {
        self.inner.state.borrow().index.get(key).copied()
    }

    /// Whether `key` is present.
    #[must_use]
    pub fn contains_key(&self, key: &K) -> bool {
        self.inner.state.borrow().index.contains_key(key)
    }

    /// Key of the value behind `id`.
    #[must_use]
    pub fn key_of_box(&self, id: BoxId) -> Option<K> {
        self.with(id, |v| (self.inner.key_of)(v))
    }

    /// Number of live boxes.
    #[must_use]
    pub fn count(&self) -> usize {
        self.inner.state.borrow().slots.order.len()
    }

    /// Whether the collection is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// Snapshot of the live boxes in order. Call again to restart.
    #[must_use]
    pub fn values(&self) -> std::vec::IntoIter<BoxId> {
        self.inner.state.borrow().slots.order.clone().into_iter()
    }

    /// Borrow the value behind `id`.
    pub fn with<R>(&self, id: BoxId, f: impl FnOnce(&T) -> R) -> Option<R> {
        self.inner.state.borrow().slots.arena.get(id).map(f)
    }

    /// Listen for change events.
    pub fn subscribe(&self, callback: impl Fn(&CollectionChange) + 'static) -> Subscription {
        self.inner.changed.subscribe(callback)
    }

    fn resolve(&self, keys: &[K]) -> Vec<BoxId> {
        let state = self.inner.state.borrow();
        let ids: Vec<BoxId> = keys
            .iter()
            .filter_map(|key| state.index.get(key).copied())
            .collect();
        if ids.len() < keys.len() {
            tracing::warn!(
                requested = keys.len(),
                found = ids.len(),
                "remove named keys that are not in the collection"
            );
        }
        ids
    }

    fn commit(&self, removed: Vec<BoxId>, items: Vec<T>) {
        let change = {
            let mut state = self.inner.state.borrow_mut();
            let key_of = self.inner.key_of.as_ref();
            let gone = state.remove_ids(key_of, &removed);
            let upserted = state.upsert(key_of, items);
            CollectionChange::classify(upserted.added, gone, upserted.updated)
        };
        if let Some(change) = change {
            tracing::trace!(
                kind = ?change.kind,
                added = change.new_items.len(),
                removed = change.old_items.len(),
                updated = change.updated_items.len(),
                "key array changed"
            );
            self.emit(&change);
        }
    }

    fn emit(&self, change: &CollectionChange) {
        self.inner.queue.notify(|| self.inner.changed.raise(change));
    }
}

impl<K: Eq + Hash + Clone + 'static, T: Clone + 'static> ObservableKeyArray<K, T> {
    /// Clone of the value stored under `key`.
    #[must_use]
    pub fn get_by_key(&self, key: &K) -> Option<T> {
        let id = self.get_box_by_key(key)?;
        self.with(id, T::clone)
    }
}

impl<K: Eq + Hash + Clone + 'static, T: 'static> CollectionSource for ObservableKeyArray<K, T> {
    type Item = T;
    type Key = K;

    fn values(&self) -> Vec<BoxId> {
        self.inner.state.borrow().slots.order.clone()
    }

    fn count(&self) -> usize {
        ObservableKeyArray::count(self)
    }

    fn contains(&self, id: BoxId) -> bool {
        self.inner.state.borrow().slots.arena.contains(id)
    }

    fn read<R>(&self, f: impl FnOnce(&BoxArena<T>) -> R) -> R {
        f(&self.inner.state.borrow().slots.arena)
    }

    fn box_by_key(&self, key: &K) -> Option<BoxId> {
        self.get_box_by_key(key)
    }

    fn subscribe(&self, callback: impl Fn(&CollectionChange) + 'static) -> Subscription {
        ObservableKeyArray::subscribe(self, callback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::change::ChangeKind;

    #[derive(Debug, Clone, PartialEq)]
    struct Server {
        tag: &'static str,
        players: u32,
    }

    fn server(tag: &'static str, players: u32) -> Server {
        Server { tag, players }
    }

    fn servers() -> ObservableKeyArray<&'static str, Server> {
        ObservableKeyArray::new(|s: &Server| s.tag)
    }

    fn record(
        array: &ObservableKeyArray<&'static str, Server>,
    ) -> (Rc<RefCell<Vec<CollectionChange>>>, Subscription) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let l = Rc::clone(&log);
        let sub = array.subscribe(move |c| l.borrow_mut().push(c.clone()));
        (log, sub)
    }

    #[test]
    fn add_existing_key_replaces_in_place() {
        let array = servers();
        array.add([server("eu-1", 3), server("us-1", 5)]);
        let eu = array.get_box_by_key(&"eu-1").unwrap();
        let (log, _sub) = record(&array);

        array.add([server("eu-1", 9)]);
        assert_eq!(array.get_box_by_key(&"eu-1"), Some(eu), "identity kept");
        assert_eq!(array.get_by_key(&"eu-1").unwrap().players, 9);
        assert_eq!(array.count(), 2);

        let log = log.borrow();
        assert_eq!(log[0].kind, ChangeKind::Update);
        assert_eq!(log[0].updated_items, vec![eu]);
        assert!(log[0].new_items.is_empty());
    }

    #[test]
    fn mixed_batch_is_add_and_remove() {
        let array = servers();
        array.add([server("eu-1", 3)]);
        let (log, _sub) = record(&array);

        array.update(Delta::add_and_remove(
            [server("eu-1", 4), server("ap-1", 1)],
            [],
        ));
        assert_eq!(log.borrow()[0].kind, ChangeKind::AddAndRemove);
        assert_eq!(log.borrow()[0].updated_items.len(), 1);
        assert_eq!(log.borrow()[0].new_items.len(), 1);
    }

    #[test]
    fn remove_by_key_keeps_index_in_sync() {
        let array = servers();
        array.add([server("a", 0), server("b", 0), server("c", 0)]);
        array.update(Delta::remove([server("b", 99)]));

        assert!(!array.contains_key(&"b"));
        let keys: Vec<_> = array.values().filter_map(|id| array.key_of_box(id)).collect();
        assert_eq!(keys, vec!["a", "c"]);

        array.remove_keys(["missing"]);
        assert_eq!(array.count(), 2);
    }

    #[test]
    fn duplicate_keys_in_one_batch_collapse() {
        let array = servers();
        let (log, _sub) = record(&array);
        array.add([server("x", 1), server("x", 2)]);

        assert_eq!(array.count(), 1);
        assert_eq!(array.get_by_key(&"x").unwrap().players, 2);
        let log = log.borrow();
        assert_eq!(log[0].kind, ChangeKind::Add);
        assert!(log[0].updated_items.is_empty());
    }

    #[test]
    fn reset_replaces_every_box() {
        let array = servers();
        array.add([server("a", 0)]);
        let old = array.get_box_by_key(&"a").unwrap();
        let (log, _sub) = record(&array);

        array.update(Delta::reset([server("a", 1), server("z", 0)]));
        let new = array.get_box_by_key(&"a").unwrap();
        assert_ne!(old, new);
        assert_eq!(log.borrow()[0].kind, ChangeKind::Reset);
        assert_eq!(log.borrow()[0].new_items.len(), 2);
    }

    #[test]
    fn remove_by_identity_drops_key() {
        let array = servers();
        array.add([server("a", 0)]);
        let id = array.get_box_by_key(&"a").unwrap();
        array.remove(&[id]);
        assert!(array.is_empty());
        assert_eq!(array.get_box_by_key(&"a"), None);
    }
}
