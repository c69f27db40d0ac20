#![forbid(unsafe_code)]

//! Connectable property wiring between a value source and a view property.
//!
//! A [`Binding`] pairs one [`BindingSource`] with one [`BindingTarget`] and
//! does nothing until [`Binding::connected`] is called. Connecting pushes the
//! source's current value into the target once, then forwards every later
//! change until [`Binding::disconnected`].
//!
//! # Usage
//!
//! ```
//! use fsadmin_runtime::reactive::{Binding, BindingSource, Property, Setter};
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! let players = Property::new(3_u32);
//! let label = Rc::new(RefCell::new(String::new()));
//! let sink = Rc::clone(&label);
//!
//! let binding = Binding::new(
//!     players.clone().map(|n| format!("{n} online")),
//!     Setter::new(move |text: &String| *sink.borrow_mut() = text.clone()),
//! );
//! binding.connected();
//! assert_eq!(*label.borrow(), "3 online");
//!
//! players.set(4);
//! assert_eq!(*label.borrow(), "4 online");
//!
//! binding.disconnected();
//! players.set(5);
//! assert_eq!(*label.borrow(), "4 online");
//! ```
//!
//! # Invariants
//!
//! 1. A disconnected binding holds no subscription on its source.
//! 2. `connected()` and `disconnected()` are idempotent; repeated calls do
//!    not re-apply the value or double-notify the target.
//! 3. [`TwoWayBinding`] never ping-pongs: a write that originated on one
//!    side is not echoed back to it.
//! 4. Mapped sources apply the transform on every evaluation (no caching).
//!
//! # Failure Modes
//!
//! - A transform or target panic propagates to whoever triggered the value
//!   change (or to the `connected()` caller for the initial push). The
//!   binding stays disconnected if the initial push panicked, and the
//!   target never sees `connected()` for that attempt.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use super::observable::Subscription;
use super::property::Property;

// ---------------------------------------------------------------------------
// Source / target seams
// ---------------------------------------------------------------------------

/// Something with a current value and a change notification.
pub trait BindingSource<T: 'static>: 'static {
    /// The value right now.
    fn current(&self) -> T;

    /// Call `on_change` with each new value until the subscription drops.
    fn watch(&self, on_change: Box<dyn Fn(&T)>) -> Subscription;

    /// Derive a source by transforming this one's values.
    fn map<U: 'static>(self, f: impl Fn(&T) -> U + 'static) -> Mapped<U>
    where
        Self: Sized,
    {
        Mapped::new(self, f)
    }
}

impl<T: Clone + PartialEq + 'static> BindingSource<T> for Property<T> {
    fn current(&self) -> T {
        self.get()
    }

    fn watch(&self, on_change: Box<dyn Fn(&T)>) -> Subscription {
        self.subscribe(move |value| on_change(value))
    }
}

/// A source derived from another through a transform.
pub struct Mapped<U> {
    current: Rc<dyn Fn() -> U>,
    watch: Rc<dyn Fn(Box<dyn Fn(&U)>) -> Subscription>,
}

impl<U> Clone for Mapped<U> {
    fn clone(&self) -> Self {
        Self {
            current: Rc::clone(&self.current),
            watch: Rc::clone(&self.watch),
        }
    }
}

impl<U> std::fmt::Debug for Mapped<U> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mapped").finish_non_exhaustive()
    }
}

impl<U: 'static> Mapped<U> {
    fn new<T: 'static>(source: impl BindingSource<T>, f: impl Fn(&T) -> U + 'static) -> Self {
        let source = Rc::new(source);
        let f = Rc::new(f);
        let (read_source, read_f) = (Rc::clone(&source), Rc::clone(&f));
        Self {
            current: Rc::new(move || read_f(&read_source.current())),
            watch: Rc::new(move |on_change: Box<dyn Fn(&U)>| {
                let f = Rc::clone(&f);
                source.watch(Box::new(move |value: &T| on_change(&f(value))))
            }),
        }
    }
}

impl<U: 'static> BindingSource<U> for Mapped<U> {
    fn current(&self) -> U {
        (self.current)()
    }

    fn watch(&self, on_change: Box<dyn Fn(&U)>) -> Subscription {
        (self.watch)(on_change)
    }
}

/// The receiving end of a binding: usually one property of a view node.
pub trait BindingTarget<T>: 'static {
    /// Store `value` into the bound property.
    fn apply(&self, value: &T);

    /// The binding feeding this target became active. Called after the
    /// initial value was applied.
    fn connected(&self) {}

    /// The binding feeding this target became inactive.
    fn disconnected(&self) {}
}

/// Closure-backed [`BindingTarget`].
pub struct Setter<T> {
    apply: Rc<dyn Fn(&T)>,
}

impl<T> Clone for Setter<T> {
    fn clone(&self) -> Self {
        Self {
            apply: Rc::clone(&self.apply),
        }
    }
}

impl<T> std::fmt::Debug for Setter<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Setter").finish_non_exhaustive()
    }
}

impl<T> Setter<T> {
    pub fn new(apply: impl Fn(&T) + 'static) -> Self {
        Self {
            apply: Rc::new(apply),
        }
    }
}

impl<T: 'static> BindingTarget<T> for Setter<T> {
    fn apply(&self, value: &T) {
        (self.apply)(value);
    }
}

impl<T: Clone + PartialEq + 'static> BindingTarget<T> for Property<T> {
    fn apply(&self, value: &T) {
        self.set(value.clone());
    }
}

// ---------------------------------------------------------------------------
// Binding
// ---------------------------------------------------------------------------

struct BindingInner {
    link: Box<dyn Fn() -> Subscription>,
    unlink: Box<dyn Fn()>,
    active: RefCell<Option<Subscription>>,
}

/// A connectable wire from a source to a target.
///
/// Cloning shares the connection state, so a clone held by a
/// [`BindingStore`](super::BindingStore) and one held by the caller agree on
/// whether the binding is live.
#[derive(Clone)]
pub struct Binding {
    inner: Rc<BindingInner>,
}

impl std::fmt::Debug for Binding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Binding")
            .field("connected", &self.is_connected())
            .finish()
    }
}

impl Binding {
    /// Pair `source` with `target`. Inert until [`connected`](Self::connected).
    pub fn new<T: 'static>(
        source: impl BindingSource<T>,
        target: impl BindingTarget<T>,
    ) -> Self {
        let target = Rc::new(target);
        let on_unlink = Rc::clone(&target);
        Self::from_fns(
            move || {
                target.apply(&source.current());
                let forward = Rc::clone(&target);
                let subscription = source.watch(Box::new(move |value: &T| forward.apply(value)));
                target.connected();
                subscription
            },
            move || on_unlink.disconnected(),
        )
    }

    fn from_fns(link: impl Fn() -> Subscription + 'static, unlink: impl Fn() + 'static) -> Self {
        Self {
            inner: Rc::new(BindingInner {
                link: Box::new(link),
                unlink: Box::new(unlink),
                active: RefCell::new(None),
            }),
        }
    }

    /// Push the current value into the target and start forwarding changes.
    pub fn connected(&self) {
        if self.is_connected() {
            tracing::trace!("binding already connected");
            return;
        }
        let subscription = (self.inner.link)();
        *self.inner.active.borrow_mut() = Some(subscription);
        tracing::debug!("binding connected");
    }

    /// Stop forwarding. Idempotent.
    pub fn disconnected(&self) {
        let Some(subscription) = self.inner.active.borrow_mut().take() else {
            return;
        };
        drop(subscription);
        (self.inner.unlink)();
        tracing::debug!("binding disconnected");
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner.active.borrow().is_some()
    }

    /// Whether `other` is a clone of this binding.
    #[must_use]
    pub fn ptr_eq(&self, other: &Binding) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

// ---------------------------------------------------------------------------
// TwoWayBinding
// ---------------------------------------------------------------------------

/// Clears the sync flag even if the propagated `set` panics.
struct Syncing<'a>(&'a Cell<bool>);

impl Drop for Syncing<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

fn forward<T: Clone + PartialEq + 'static>(
    from: &Property<T>,
    to: &Property<T>,
    guard: &Rc<Cell<bool>>,
) -> Subscription {
    let to = to.clone();
    let guard = Rc::clone(guard);
    from.subscribe(move |value| {
        if guard.get() {
            return;
        }
        guard.set(true);
        let _syncing = Syncing(&guard);
        to.set(value.clone());
    })
}

/// Bidirectional binding between two [`Property`]s of the same type.
///
/// On connect, `b` takes `a`'s value; afterwards a change on either side is
/// written to the other. Convert into a [`Binding`] to store it on a node.
#[derive(Clone)]
pub struct TwoWayBinding<T> {
    binding: Binding,
    _marker: std::marker::PhantomData<fn(T)>,
}

impl<T> std::fmt::Debug for TwoWayBinding<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwoWayBinding")
            .field("connected", &self.binding.is_connected())
            .finish()
    }
}

impl<T: Clone + PartialEq + 'static> TwoWayBinding<T> {
    /// Wire `a` and `b` together. Inert until connected.
    pub fn new(a: &Property<T>, b: &Property<T>) -> Self {
        let (a, b) = (a.clone(), b.clone());
        let binding = Binding::from_fns(
            move || {
                b.set(a.get());
                let syncing = Rc::new(Cell::new(false));
                Subscription::all([forward(&a, &b, &syncing), forward(&b, &a, &syncing)])
            },
            || {},
        );
        Self {
            binding,
            _marker: std::marker::PhantomData,
        }
    }

    pub fn connected(&self) {
        self.binding.connected();
    }

    pub fn disconnected(&self) {
        self.binding.disconnected();
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.binding.is_connected()
    }
}

impl<T> From<TwoWayBinding<T>> for Binding {
    fn from(two_way: TwoWayBinding<T>) -> Self {
        two_way.binding
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder<T: Clone + 'static>() -> (Setter<T>, Rc<RefCell<Vec<T>>>) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        (
            Setter::new(move |v: &T| sink.borrow_mut().push(v.clone())),
            log,
        )
    }

    #[test]
    fn inert_until_connected() {
        let title = Property::new("factorio-1".to_string());
        let (setter, log) = recorder();
        let binding = Binding::new(title.clone(), setter);

        title.set("factorio-2".into());
        assert!(log.borrow().is_empty());
        assert_eq!(title.subscriber_count(), 0);

        binding.connected();
        assert_eq!(*log.borrow(), vec!["factorio-2".to_string()]);
    }

    #[test]
    fn connect_twice_applies_once() {
        let p = Property::new(1);
        let (setter, log) = recorder();
        let binding = Binding::new(p.clone(), setter);
        binding.connected();
        binding.connected();
        p.set(2);
        assert_eq!(*log.borrow(), vec![1, 2]);
        assert_eq!(p.subscriber_count(), 1);
    }

    #[test]
    fn disconnect_stops_forwarding_and_is_idempotent() {
        let p = Property::new(1);
        let (setter, log) = recorder();
        let binding = Binding::new(p.clone(), setter);
        binding.connected();
        binding.disconnected();
        binding.disconnected();
        p.set(9);
        assert_eq!(*log.borrow(), vec![1]);
        assert_eq!(p.subscriber_count(), 0);
        assert!(!binding.is_connected());
    }

    #[test]
    fn reconnect_pushes_current_value() {
        let p = Property::new(1);
        let (setter, log) = recorder();
        let binding = Binding::new(p.clone(), setter);
        binding.connected();
        binding.disconnected();
        p.set(5);
        binding.connected();
        assert_eq!(*log.borrow(), vec![1, 5]);
    }

    #[test]
    fn target_sees_connect_and_disconnect() {
        struct Probe(Rc<RefCell<Vec<&'static str>>>);
        impl BindingTarget<bool> for Probe {
            fn apply(&self, _: &bool) {
                self.0.borrow_mut().push("apply");
            }
            fn connected(&self) {
                self.0.borrow_mut().push("connected");
            }
            fn disconnected(&self) {
                self.0.borrow_mut().push("disconnected");
            }
        }

        let calls = Rc::new(RefCell::new(Vec::new()));
        let binding = Binding::new(Property::new(false), Probe(Rc::clone(&calls)));
        binding.connected();
        binding.disconnected();
        assert_eq!(*calls.borrow(), vec!["apply", "connected", "disconnected"]);
    }

    #[test]
    fn failed_initial_push_leaves_target_untouched() {
        struct Fragile(Rc<RefCell<Vec<&'static str>>>);
        impl BindingTarget<u32> for Fragile {
            fn apply(&self, value: &u32) {
                assert!(*value < 100, "value out of range");
                self.0.borrow_mut().push("apply");
            }
            fn connected(&self) {
                self.0.borrow_mut().push("connected");
            }
            fn disconnected(&self) {
                self.0.borrow_mut().push("disconnected");
            }
        }

        let calls = Rc::new(RefCell::new(Vec::new()));
        let slots = Property::new(500_u32);
        let binding = Binding::new(slots.clone(), Fragile(Rc::clone(&calls)));

        let result =
            std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| binding.connected()));
        assert!(result.is_err());
        assert!(!binding.is_connected());
        assert_eq!(slots.subscriber_count(), 0);
        binding.disconnected();
        assert!(calls.borrow().is_empty());

        slots.set(8);
        binding.connected();
        binding.disconnected();
        assert_eq!(*calls.borrow(), vec!["apply", "connected", "disconnected"]);
    }

    #[test]
    fn mapped_source_transforms_each_value() {
        let players = Property::new(2_u32);
        let (setter, log) = recorder();
        let binding = Binding::new(players.clone().map(|n| n * 10), setter);
        binding.connected();
        players.set(3);
        assert_eq!(*log.borrow(), vec![20, 30]);
    }

    #[test]
    fn mapped_sources_compose() {
        let p = Property::new(4_i32);
        let mapped = p.clone().map(|n| n + 1).map(|n| format!("#{n}"));
        assert_eq!(mapped.current(), "#5");
    }

    #[test]
    fn property_target_receives_values() {
        let source = Property::new(7);
        let target = Property::new(0);
        let binding = Binding::new(source.clone(), target.clone());
        binding.connected();
        assert_eq!(target.get(), 7);
        source.set(8);
        assert_eq!(target.get(), 8);
    }

    #[test]
    fn two_way_syncs_both_directions() {
        let a = Property::new(42);
        let b = Property::new(0);
        let binding = TwoWayBinding::new(&a, &b);
        assert_eq!(b.get(), 0, "inert before connect");

        binding.connected();
        assert_eq!(b.get(), 42);
        a.set(10);
        assert_eq!(b.get(), 10);
        b.set(20);
        assert_eq!(a.get(), 20);
    }

    #[test]
    fn two_way_does_not_echo() {
        let a = Property::new(0);
        let b = Property::new(0);
        let binding = TwoWayBinding::new(&a, &b);
        binding.connected();
        a.set(1);
        assert_eq!(a.version(), 1);
        assert_eq!(b.version(), 1);
    }

    #[test]
    fn two_way_disconnect_releases_both() {
        let a = Property::new(1);
        let b = Property::new(1);
        let binding: Binding = TwoWayBinding::new(&a, &b).into();
        binding.connected();
        binding.disconnected();
        assert_eq!(a.subscriber_count(), 0);
        assert_eq!(b.subscriber_count(), 0);
        a.set(5);
        assert_eq!(b.get(), 1);
    }
}
