#![forbid(unsafe_code)]

//! Sorted, filterable, selectable projection of a collection.
//!
//! # Design
//!
//! A [`CollectionView`] wraps one [`CollectionSource`] and keeps its own
//! materialized order of the source's boxes (never copies of values), a
//! sort spec list, an optional filter, and a selection set. Several views
//! over the same source are fully independent.
//!
//! When the source changes, the view works out the cheapest true
//! description of what happened to *its* projection and raises that:
//!
//! | Source change | View reaction |
//! |---|---|
//! | `Reset` | rebuild and sort from scratch, raise `Reset` |
//! | boxes added | binary-search insert each, raise `Add` with exactly those boxes |
//! | boxes removed | splice out of order and selection, raise `Remove` |
//! | value updated in place | re-splice only if it now sorts elsewhere (`Reorder`), otherwise `Add` of the already-visible box (content refresh) |
//!
//! A single source change can produce up to three view events, always in
//! the order `Remove`, `Add`, `Reorder`. The view's state is final before
//! the first of them is raised.
//!
//! Source changes that arrive while the view is raising its own events are
//! queued. Every box they touch is marked stale as soon as the source
//! reports it, and the next reaction to run re-places all stale boxes, not
//! only its own, so the order it binary-searches is always sorted. A
//! pending source reset supersedes any queued delta.
//!
//! # Invariants
//!
//! 1. Every selected box is present in the view.
//! 2. The view order is a permutation of the source boxes that pass the
//!    filter, sorted by the spec chain with ties in source order.
//! 3. Selection changes raise `selected_changed` exactly once, and only when
//!    membership actually changed.
//! 4. A box removed from the source leaves the selection before any event
//!    describing the removal is raised.
//!
//! # Failure Modes
//!
//! - Selecting a box that is not in the view is a logged no-op.
//! - A comparator or filter panic propagates to whoever triggered the
//!   recomputation; the view may then hold a partially updated order.
//! - Mutating the view from inside one of its own handlers is deferred or
//!   rejected per [`ReentrancyPolicy`](fsadmin_core::ReentrancyPolicy).

use std::cell::{Cell, RefCell};
use std::cmp::Ordering;
use std::rc::{Rc, Weak};

use ahash::AHashSet;
use fsadmin_core::{EngineConfig, SelectionMode, SortDirection};

use super::boxed::{BoxArena, BoxId};
use super::change::{ChangeKind, CollectionChange, ViewChange, ViewChangeKind};
use super::collection::ObservableCollection;
use super::deferred::DeferredQueue;
use super::observable::{Observable, Subscription};
use super::sort::{SortDescriptor, SortSpec, compare_boxes};
use super::source::CollectionSource;

type Filter<T> = Rc<dyn Fn(&T) -> bool>;

/// Above this many insertions in one change, append and re-sort instead of
/// inserting one by one.
const BULK_INSERT_THRESHOLD: usize = 32;

struct ViewState<T> {
    specs: Vec<SortSpec<T>>,
    filter: Option<Filter<T>>,
    order: Vec<BoxId>,
    members: AHashSet<BoxId>,
    selected: AHashSet<BoxId>,
    mode: SelectionMode,
    default_direction: SortDirection,
}

/// Events and notifications produced by one logical update.
#[derive(Default)]
struct Outcome {
    events: Vec<ViewChange>,
    selection_changed: bool,
    sort_changed: bool,
}

impl<T> ViewState<T> {
    fn passes(&self, value: &T) -> bool {
        self.filter.as_ref().is_none_or(|f| f(value))
    }

    fn sort(&mut self, arena: &BoxArena<T>) {
        let specs = &self.specs;
        self.order.sort_by(|a, b| compare_boxes(specs, arena, *a, *b));
    }

    fn rebuild(&mut self, arena: &BoxArena<T>, source_order: Vec<BoxId>) {
        let mut order = source_order;
        order.retain(|id| arena.get(*id).is_some_and(|v| self.passes(v)));
        self.order = order;
        self.sort(arena);
        self.members = self.order.iter().copied().collect();
    }

    fn insert_sorted(&mut self, arena: &BoxArena<T>, id: BoxId) {
        let specs = &self.specs;
        let pos = self
            .order
            .partition_point(|x| compare_boxes(specs, arena, *x, id) == Ordering::Less);
        self.order.insert(pos, id);
        self.members.insert(id);
    }

    fn insert_many(&mut self, arena: &BoxArena<T>, ids: &[BoxId]) {
        if ids.len() > BULK_INSERT_THRESHOLD {
            self.order.extend_from_slice(ids);
            self.members.extend(ids.iter().copied());
            self.sort(arena);
        } else {
            for id in ids {
                self.insert_sorted(arena, *id);
            }
        }
    }

    /// Splice `doomed` out of order, membership and selection. Returns the
    /// removed boxes in former view order and whether selection shrank.
    fn remove_members(&mut self, doomed: &AHashSet<BoxId>) -> (Vec<BoxId>, bool) {
        if doomed.is_empty() {
            return (Vec::new(), false);
        }
        let mut removed = Vec::new();
        self.order.retain(|id| {
            if doomed.contains(id) {
                removed.push(*id);
                false
            } else {
                true
            }
        });
        let mut selection_changed = false;
        for id in &removed {
            self.members.remove(id);
            selection_changed |= self.selected.remove(id);
        }
        (removed, selection_changed)
    }

    fn prune_selection(&mut self) -> bool {
        let before = self.selected.len();
        let members = &self.members;
        self.selected.retain(|id| members.contains(id));
        self.selected.len() != before
    }

    /// `subset` listed in current view order.
    fn in_view_order(&self, subset: &AHashSet<BoxId>) -> Vec<BoxId> {
        self.order
            .iter()
            .copied()
            .filter(|id| subset.contains(id))
            .collect()
    }

    fn selected_in_order(&self) -> Vec<BoxId> {
        self.in_view_order(&self.selected)
    }

    fn descriptors(&self) -> Vec<SortDescriptor> {
        self.specs.iter().map(SortSpec::descriptor).collect()
    }

    /// Replace the selection, reporting whether membership changed.
    fn replace_selection(&mut self, next: AHashSet<BoxId>) -> bool {
        if next == self.selected {
            return false;
        }
        self.selected = next;
        true
    }
}

struct ViewInner<S: CollectionSource> {
    source: S,
    state: RefCell<ViewState<S::Item>>,
    changed: Observable<ViewChange>,
    selected_changed: Observable<Vec<BoxId>>,
    sort_changed: Observable<Vec<SortDescriptor>>,
    queue: DeferredQueue,
    /// Boxes changed or removed by source changes not yet applied here.
    stale: RefCell<AHashSet<BoxId>>,
    reset_pending: Cell<bool>,
    source_sub: RefCell<Option<Subscription>>,
}

/// Independently sorted, filtered and selectable projection of a source.
pub struct CollectionView<S: CollectionSource> {
    inner: Rc<ViewInner<S>>,
}

impl<S: CollectionSource> Clone for CollectionView<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<S: CollectionSource> std::fmt::Debug for CollectionView<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.borrow();
        f.debug_struct("CollectionView")
            .field("count", &state.order.len())
            .field("selected", &state.selected.len())
            .field("mode", &state.mode)
            .field("sort", &state.descriptors())
            .field("filtered", &state.filter.is_some())
            .finish()
    }
}

impl<T: 'static> CollectionView<ObservableCollection<T>> {
    /// View over a fresh collection holding `values`.
    pub fn from_values(values: impl IntoIterator<Item = T>) -> Self {
        Self::new(ObservableCollection::from_values(values))
    }
}

impl<S: CollectionSource> CollectionView<S> {
    /// View with default configuration.
    pub fn new(source: S) -> Self {
        Self::with_config(source, &EngineConfig::default())
    }

    /// View using the selection mode, default sort direction and
    /// re-entrancy policy from `config`.
    pub fn with_config(source: S, config: &EngineConfig) -> Self {
        let inner = Rc::new(ViewInner {
            source: source.clone(),
            state: RefCell::new(ViewState {
                specs: Vec::new(),
                filter: None,
                order: Vec::new(),
                members: AHashSet::new(),
                selected: AHashSet::new(),
                mode: config.selection_mode,
                default_direction: config.default_direction,
            }),
            changed: Observable::new(),
            selected_changed: Observable::new(),
            sort_changed: Observable::new(),
            queue: DeferredQueue::new("CollectionView", config.reentrancy),
            stale: RefCell::new(AHashSet::new()),
            reset_pending: Cell::new(false),
            source_sub: RefCell::new(None),
        });

        source.read(|arena| {
            inner
                .state
                .borrow_mut()
                .rebuild(arena, source.values());
        });

        let weak: Weak<ViewInner<S>> = Rc::downgrade(&inner);
        let sub = source.subscribe(move |change| {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let view = CollectionView { inner };
            view.mark_stale(change);
            let change = change.clone();
            let target = view.clone();
            view.inner
                .queue
                .run_or_queue(move || target.apply_source_change(&change));
        });
        *inner.source_sub.borrow_mut() = Some(sub);

        Self { inner }
    }

    /// The wrapped source.
    #[must_use]
    pub fn source(&self) -> &S {
        &self.inner.source
    }

    // ------------------------------------------------------------------
    // Reading
    // ------------------------------------------------------------------

    /// Snapshot of the visible boxes in view order. Call again to restart.
    #[must_use]
    pub fn values(&self) -> std::vec::IntoIter<BoxId> {
        self.inner.state.borrow().order.clone().into_iter()
    }

    /// Number of visible boxes.
    #[must_use]
    pub fn count(&self) -> usize {
        self.inner.state.borrow().order.len()
    }

    /// Whether `id` is visible in this view.
    #[must_use]
    pub fn contains(&self, id: BoxId) -> bool {
        self.inner.state.borrow().members.contains(&id)
    }

    /// Position of `id` in view order.
    #[must_use]
    pub fn index_of(&self, id: BoxId) -> Option<usize> {
        self.inner.state.borrow().order.iter().position(|x| *x == id)
    }

    /// Borrow the value behind a visible box.
    pub fn with<R>(&self, id: BoxId, f: impl FnOnce(&S::Item) -> R) -> Option<R> {
        if !self.contains(id) {
            return None;
        }
        self.inner.source.read(|arena| arena.get(id).map(f))
    }

    /// Resolve a key through the source's index, if the box is visible here.
    #[must_use]
    pub fn get_box_by_key(&self, key: &S::Key) -> Option<BoxId> {
        self.inner
            .source
            .box_by_key(key)
            .filter(|id| self.contains(*id))
    }

    /// Selected boxes in view order.
    #[must_use]
    pub fn selected(&self) -> Vec<BoxId> {
        self.inner.state.borrow().selected_in_order()
    }

    #[must_use]
    pub fn selected_count(&self) -> usize {
        self.inner.state.borrow().selected.len()
    }

    #[must_use]
    pub fn is_selected(&self, id: BoxId) -> bool {
        self.inner.state.borrow().selected.contains(&id)
    }

    /// First selected box in view order.
    #[must_use]
    pub fn first_selected(&self) -> Option<BoxId> {
        let state = self.inner.state.borrow();
        state
            .order
            .iter()
            .copied()
            .find(|id| state.selected.contains(id))
    }

    #[must_use]
    pub fn selection_mode(&self) -> SelectionMode {
        self.inner.state.borrow().mode
    }

    /// Active sort keys, primary first.
    #[must_use]
    pub fn sort_specs(&self) -> Vec<SortDescriptor> {
        self.inner.state.borrow().descriptors()
    }

    /// Whether a filter is installed.
    #[must_use]
    pub fn is_filtered(&self) -> bool {
        self.inner.state.borrow().filter.is_some()
    }

    // ------------------------------------------------------------------
    // Notifications
    // ------------------------------------------------------------------

    /// Listen for view changes.
    pub fn subscribe(&self, callback: impl Fn(&ViewChange) + 'static) -> Subscription {
        self.inner.changed.subscribe(callback)
    }

    /// Raised with the selected boxes (view order) whenever selection
    /// membership changes.
    #[must_use]
    pub fn selected_changed(&self) -> &Observable<Vec<BoxId>> {
        &self.inner.selected_changed
    }

    /// Raised with the active sort keys whenever the spec list changes.
    #[must_use]
    pub fn sort_changed(&self) -> &Observable<Vec<SortDescriptor>> {
        &self.inner.sort_changed
    }

    // ------------------------------------------------------------------
    // Sorting and filtering
    // ------------------------------------------------------------------

    /// Make `spec` a sort key. A spec with the same `sort_id` is replaced
    /// where it stands; otherwise `spec` becomes the primary key.
    pub fn sort_by(&self, spec: SortSpec<S::Item>) {
        self.mutate(move |view| {
            view.apply_specs(|specs| {
                match specs.iter().position(|s| s.sort_id() == spec.sort_id()) {
                    Some(pos) => specs[pos] = spec,
                    None => specs.insert(0, spec),
                }
            });
        });
    }

    /// [`sort_by`](Self::sort_by) a derived key in the configured default
    /// direction.
    pub fn sort_by_key<K: Ord + 'static>(
        &self,
        sort_id: impl Into<String>,
        key: impl Fn(&S::Item) -> K + 'static,
    ) {
        let direction = self.inner.state.borrow().default_direction;
        self.sort_by(SortSpec::by_key(sort_id, key).with_direction(direction));
    }

    /// Header-click semantics: if `spec` is already primary, flip its
    /// direction; otherwise move it to the front with its own direction.
    pub fn toggle_sort(&self, spec: SortSpec<S::Item>) {
        self.mutate(move |view| {
            view.apply_specs(|specs| {
                if specs.first().is_some_and(|p| p.sort_id() == spec.sort_id()) {
                    let direction = specs[0].direction().flipped();
                    let primary = specs.remove(0).with_direction(direction);
                    specs.insert(0, primary);
                } else {
                    specs.retain(|s| s.sort_id() != spec.sort_id());
                    specs.insert(0, spec);
                }
            });
        });
    }

    /// Replace the whole spec list.
    pub fn set_sort_specs(&self, specs: Vec<SortSpec<S::Item>>) {
        self.mutate(move |view| view.apply_specs(|current| *current = specs));
    }

    /// Drop every sort key; the view returns to source order.
    pub fn clear_sort(&self) {
        self.mutate(|view| view.apply_specs(Vec::clear));
    }

    /// Only show boxes whose value satisfies `filter`.
    pub fn set_filter(&self, filter: impl Fn(&S::Item) -> bool + 'static) {
        let filter: Filter<S::Item> = Rc::new(filter);
        self.mutate(move |view| view.apply_filter(Some(filter)));
    }

    /// Show every source box again.
    pub fn clear_filter(&self) {
        self.mutate(|view| view.apply_filter(None));
    }

    // ------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------

    /// Make `id` the only selected box, or clear the selection for `None`.
    pub fn set_single_selected(&self, id: Option<BoxId>) {
        self.mutate(move |view| {
            let changed = {
                let mut state = view.inner.state.borrow_mut();
                let next = match id {
                    Some(id) if !state.members.contains(&id) => {
                        tracing::warn!(%id, "select of a box that is not in the view ignored");
                        return;
                    }
                    Some(id) => AHashSet::from_iter([id]),
                    None => AHashSet::new(),
                };
                state.replace_selection(next)
            };
            view.finish(Outcome {
                selection_changed: changed,
                ..Outcome::default()
            });
        });
    }

    /// Add `id` to or remove it from the selection. In single mode,
    /// selecting replaces the current selection.
    pub fn set_selected(&self, id: BoxId, is_selected: bool) {
        self.mutate(move |view| {
            let changed = {
                let mut state = view.inner.state.borrow_mut();
                if !state.members.contains(&id) {
                    tracing::warn!(%id, "select of a box that is not in the view ignored");
                    return;
                }
                match (is_selected, state.mode) {
                    (false, _) => state.selected.remove(&id),
                    (true, SelectionMode::Multiple) => state.selected.insert(id),
                    (true, SelectionMode::Single) => {
                        state.replace_selection(AHashSet::from_iter([id]))
                    }
                }
            };
            view.finish(Outcome {
                selection_changed: changed,
                ..Outcome::default()
            });
        });
    }

    /// Select every visible box. Ignored in single mode.
    pub fn select_all(&self) {
        self.mutate(|view| {
            let changed = {
                let mut state = view.inner.state.borrow_mut();
                if state.mode == SelectionMode::Single {
                    tracing::debug!("select_all ignored in single selection mode");
                    return;
                }
                let all = state.members.clone();
                state.replace_selection(all)
            };
            view.finish(Outcome {
                selection_changed: changed,
                ..Outcome::default()
            });
        });
    }

    /// Clear the selection.
    pub fn unselect_all(&self) {
        self.mutate(|view| {
            let changed = view
                .inner
                .state
                .borrow_mut()
                .replace_selection(AHashSet::new());
            view.finish(Outcome {
                selection_changed: changed,
                ..Outcome::default()
            });
        });
    }

    /// Switch selection mode. Going to single mode keeps only the first
    /// selected box in view order.
    pub fn set_selection_mode(&self, mode: SelectionMode) {
        self.mutate(move |view| {
            let changed = {
                let mut state = view.inner.state.borrow_mut();
                state.mode = mode;
                if mode == SelectionMode::Single && state.selected.len() > 1 {
                    let keep = state.selected_in_order().into_iter().take(1);
                    state.replace_selection(keep.collect())
                } else {
                    false
                }
            };
            view.finish(Outcome {
                selection_changed: changed,
                ..Outcome::default()
            });
        });
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn mutate(&self, op: impl FnOnce(&Self) + 'static) {
        let view = self.clone();
        self.inner.queue.run_or_defer(move || {
            view.settle();
            op(&view);
        });
    }

    fn mark_stale(&self, change: &CollectionChange) {
        if change.kind == ChangeKind::Reset {
            self.inner.reset_pending.set(true);
            return;
        }
        self.inner.stale.borrow_mut().extend(
            change
                .updated_items
                .iter()
                .chain(&change.old_items)
                .copied(),
        );
    }

    /// Catch up with source changes still waiting in the queue, so a view
    /// operation never works on an order holding stale boxes.
    fn settle(&self) {
        if self.inner.reset_pending.get() {
            self.apply_reset();
        } else if !self.inner.stale.borrow().is_empty() {
            self.apply_delta(&[], &[]);
        }
    }

    fn apply_specs(&self, edit: impl FnOnce(&mut Vec<SortSpec<S::Item>>)) {
        #[cfg(feature = "tracing")]
        let _span = tracing::debug_span!("collection_view_sort").entered();

        let reordered = self.inner.source.read(|arena| {
            let mut state = self.inner.state.borrow_mut();
            edit(&mut state.specs);
            let before = state.order.clone();
            state.sort(arena);
            state.order != before
        });
        let mut outcome = Outcome {
            sort_changed: true,
            ..Outcome::default()
        };
        if reordered {
            outcome.events.push(ViewChange::new(
                ViewChangeKind::Reorder,
                self.inner.state.borrow().order.clone(),
            ));
        }
        tracing::debug!(sort = ?self.sort_specs(), reordered, "view sort changed");
        self.finish(outcome);
    }

    fn apply_filter(&self, filter: Option<Filter<S::Item>>) {
        #[cfg(feature = "tracing")]
        let _span = tracing::debug_span!("collection_view_filter").entered();

        let source_order = self.inner.source.values();
        let outcome = self.inner.source.read(|arena| {
            let mut state = self.inner.state.borrow_mut();
            state.filter = filter;
            let mut leaving = AHashSet::new();
            let mut entering = Vec::new();
            for id in source_order {
                let passes = arena.get(id).is_some_and(|v| state.passes(v));
                match (state.members.contains(&id), passes) {
                    (true, false) => {
                        leaving.insert(id);
                    }
                    (false, true) => entering.push(id),
                    _ => {}
                }
            }
            let (removed, selection_changed) = state.remove_members(&leaving);
            state.insert_many(arena, &entering);
            let entering: AHashSet<BoxId> = entering.into_iter().collect();

            let mut outcome = Outcome {
                selection_changed,
                ..Outcome::default()
            };
            if !removed.is_empty() {
                outcome.events.push(ViewChange::removed(removed));
            }
            if !entering.is_empty() {
                outcome.events.push(ViewChange::new(
                    ViewChangeKind::Add,
                    state.in_view_order(&entering),
                ));
            }
            outcome
        });
        tracing::debug!(
            filtered = self.is_filtered(),
            events = outcome.events.len(),
            "view filter changed"
        );
        self.finish(outcome);
    }

    fn apply_source_change(&self, change: &CollectionChange) {
        match change.kind {
            ChangeKind::Reset => self.apply_reset(),
            _ if self.inner.reset_pending.get() => {
                tracing::trace!(
                    source_kind = ?change.kind,
                    "source change superseded by pending reset"
                );
            }
            _ => self.apply_delta(
                &change.old_items,
                &[change.updated_items.as_slice(), change.new_items.as_slice()],
            ),
        }
    }

    fn apply_reset(&self) {
        #[cfg(feature = "tracing")]
        let _span = tracing::debug_span!("collection_view_reset").entered();

        self.inner.reset_pending.set(false);
        self.inner.stale.borrow_mut().clear();
        let source_order = self.inner.source.values();
        let outcome = self.inner.source.read(|arena| {
            let mut state = self.inner.state.borrow_mut();
            state.rebuild(arena, source_order);
            let selection_changed = state.prune_selection();
            Outcome {
                events: vec![ViewChange::new(ViewChangeKind::Reset, state.order.clone())],
                selection_changed,
                sort_changed: false,
            }
        });
        tracing::debug!(count = self.count(), "view reset");
        self.finish(outcome);
    }

    /// Apply removals of `old_items` and re-place every box in `touched`,
    /// together with everything marked stale so far.
    fn apply_delta(&self, old_items: &[BoxId], touched: &[&[BoxId]]) {
        let stale: Vec<BoxId> = self.inner.stale.borrow_mut().drain().collect();
        let outcome = self.inner.source.read(|arena| {
            let mut state = self.inner.state.borrow_mut();

            // A stale box missing from the source was removed by a change
            // that is still queued.
            let (stale_gone, stale_live): (Vec<BoxId>, Vec<BoxId>) =
                stale.into_iter().partition(|id| arena.get(*id).is_none());
            let gone: AHashSet<BoxId> = old_items
                .iter()
                .chain(&stale_gone)
                .copied()
                .filter(|id| state.members.contains(id))
                .collect();
            let (mut removed, mut selection_changed) = state.remove_members(&gone);

            // Classify every touched box against the filter.
            let mut seen = AHashSet::new();
            let mut leaving = AHashSet::new();
            let mut staying = Vec::new();
            let mut entering = Vec::new();
            let touched = touched
                .iter()
                .flat_map(|ids| ids.iter())
                .chain(&stale_live);
            for &id in touched {
                if !seen.insert(id) {
                    continue;
                }
                let Some(value) = arena.get(id) else {
                    continue;
                };
                match (state.members.contains(&id), state.passes(value)) {
                    (true, true) => staying.push(id),
                    (true, false) => {
                        leaving.insert(id);
                    }
                    (false, true) => entering.push(id),
                    (false, false) => {}
                }
            }

            let (left, left_selected) = state.remove_members(&leaving);
            removed.extend(left);
            selection_changed |= left_selected;

            // Re-splice updated boxes; only those that end up elsewhere moved.
            let mut moved = AHashSet::new();
            let mut refreshed: AHashSet<BoxId> = AHashSet::new();
            if !staying.is_empty() {
                let stay: AHashSet<BoxId> = staying.iter().copied().collect();
                let before = state.order.clone();
                state.order.retain(|id| !stay.contains(id));
                for id in &staying {
                    state.insert_sorted(arena, *id);
                }
                for (old, new) in before.iter().zip(&state.order) {
                    if old != new && stay.contains(new) {
                        moved.insert(*new);
                    }
                }
                refreshed = stay.difference(&moved).copied().collect();
            }

            state.insert_many(arena, &entering);

            let mut outcome = Outcome {
                selection_changed,
                ..Outcome::default()
            };
            if !removed.is_empty() {
                outcome.events.push(ViewChange::removed(removed));
            }
            let mut added: AHashSet<BoxId> = entering.into_iter().collect();
            added.extend(refreshed);
            if !added.is_empty() {
                outcome
                    .events
                    .push(ViewChange::new(ViewChangeKind::Add, state.in_view_order(&added)));
            }
            if !moved.is_empty() {
                outcome.events.push(ViewChange::new(
                    ViewChangeKind::Reorder,
                    state.in_view_order(&moved),
                ));
            }
            outcome
        });
        tracing::trace!(events = outcome.events.len(), "view applied source change");
        self.finish(outcome);
    }

    /// Raise everything an update produced inside one notification.
    fn finish(&self, outcome: Outcome) {
        if outcome.events.is_empty() && !outcome.selection_changed && !outcome.sort_changed {
            return;
        }
        let inner = &self.inner;
        inner.queue.notify(|| {
            for event in &outcome.events {
                tracing::trace!(kind = ?event.kind, "view change raised");
                inner.changed.raise(event);
            }
            if outcome.sort_changed {
                let specs = inner.state.borrow().descriptors();
                inner.sort_changed.raise(&specs);
            }
            if outcome.selection_changed {
                let selected = inner.state.borrow().selected_in_order();
                inner.selected_changed.raise(&selected);
            }
        });
    }
}
