#![forbid(unsafe_code)]

//! Synchronous pub-sub event with snapshot delivery.
//!
//! # Design
//!
//! [`Observable<T>`] is an event, not a value: it holds an insertion-ordered
//! list of subscriber callbacks and [`raise`](Observable::raise) hands a
//! borrowed payload to each of them. Subscribers are kept in shared,
//! reference-counted storage (`Rc<RefCell<..>>`); cloning an `Observable`
//! yields another handle to the same subscriber list.
//!
//! # Invariants
//!
//! 1. Subscribers are invoked in subscription order.
//! 2. `raise` works on a snapshot taken at call time: a callback subscribed
//!    during a raise is not invoked by that raise.
//! 3. A callback unsubscribed during a raise is never invoked after its
//!    removal, even if it is still in the in-flight snapshot.
//! 4. [`Subscription::unsubscribe`] is idempotent; dropping a
//!    `Subscription` unsubscribes.
//!
//! # Failure Modes
//!
//! - **Subscriber panic**: the remaining subscribers of the in-flight raise
//!   still run, then the first panic is resumed on the raising thread.
//! - **Re-entrant raise**: allowed. Each nested raise takes its own snapshot.

use std::cell::{Cell, RefCell};
use std::panic::{self, AssertUnwindSafe};
use std::rc::{Rc, Weak};

/// One registered callback. `active` is cleared on unsubscribe so a stale
/// snapshot entry is skipped.
struct Entry<T> {
    id: u64,
    active: Cell<bool>,
    callback: Box<dyn Fn(&T)>,
}

struct ObservableInner<T> {
    next_id: u64,
    subscribers: Vec<Rc<Entry<T>>>,
}

/// A synchronous event that can be raised with a `&T` payload.
pub struct Observable<T> {
    inner: Rc<RefCell<ObservableInner<T>>>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> std::fmt::Debug for Observable<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observable")
            .field("subscriber_count", &self.inner.borrow().subscribers.len())
            .finish()
    }
}

impl<T: 'static> Default for Observable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> Observable<T> {
    /// Create an event with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(ObservableInner {
                next_id: 0,
                subscribers: Vec::new(),
            })),
        }
    }

    /// Register `callback`. It stays registered until the returned
    /// [`Subscription`] is unsubscribed or dropped.
    pub fn subscribe(&self, callback: impl Fn(&T) + 'static) -> Subscription {
        let id = {
            let mut inner = self.inner.borrow_mut();
            let id = inner.next_id;
            inner.next_id += 1;
            inner.subscribers.push(Rc::new(Entry {
                id,
                active: Cell::new(true),
                callback: Box::new(callback),
            }));
            id
        };
        let weak: Weak<RefCell<ObservableInner<T>>> = Rc::downgrade(&self.inner);
        Subscription::new(move || {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            // Dropping the callback may run arbitrary drops; release the
            // borrow first.
            let removed = {
                let mut inner = inner.borrow_mut();
                let pos = inner.subscribers.iter().position(|e| e.id == id);
                pos.map(|pos| inner.subscribers.remove(pos))
            };
            if let Some(entry) = removed {
                entry.active.set(false);
            }
        })
    }

    /// Invoke every callback registered at call time, in order.
    ///
    /// # Panics
    ///
    /// Re-raises the first panic thrown by a subscriber after all other
    /// subscribers of this raise have run.
    pub fn raise(&self, value: &T) {
        let snapshot: Vec<Rc<Entry<T>>> = self.inner.borrow().subscribers.clone();
        tracing::trace!(subscribers = snapshot.len(), "observable raise");

        let mut first_panic = None;
        for entry in &snapshot {
            if !entry.active.get() {
                continue;
            }
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| (entry.callback)(value)));
            if let Err(payload) = outcome {
                tracing::warn!(subscriber = entry.id, "observable subscriber panicked");
                first_panic.get_or_insert(payload);
            }
        }
        if let Some(payload) = first_panic {
            panic::resume_unwind(payload);
        }
    }
}

impl<T> Observable<T> {
    /// Number of currently registered subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.borrow().subscribers.len()
    }

    /// Whether nobody is listening.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscriber_count() == 0
    }
}

/// Handle returned by [`Observable::subscribe`].
///
/// Unsubscribes on drop. Call [`detach`](Subscription::detach) to keep the
/// callback registered for the lifetime of the event instead.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    cancel: RefCell<Option<Box<dyn FnOnce()>>>,
}

impl Subscription {
    /// A subscription whose cancellation runs `cancel` exactly once.
    pub fn new(cancel: impl FnOnce() + 'static) -> Self {
        Self {
            cancel: RefCell::new(Some(Box::new(cancel))),
        }
    }

    /// A subscription that is already inert.
    pub fn empty() -> Self {
        Self {
            cancel: RefCell::new(None),
        }
    }

    /// Combine several subscriptions into one. Cancellation runs in
    /// reverse order.
    pub fn all(subscriptions: impl IntoIterator<Item = Subscription>) -> Self {
        let mut subs: Vec<Subscription> = subscriptions.into_iter().collect();
        Self::new(move || {
            while let Some(sub) = subs.pop() {
                sub.unsubscribe();
            }
        })
    }

    /// Remove the callback. Calling it again is a no-op.
    pub fn unsubscribe(&self) {
        let cancel = self.cancel.borrow_mut().take();
        if let Some(cancel) = cancel {
            cancel();
        }
    }

    /// Whether [`unsubscribe`](Self::unsubscribe) has not run yet.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.cancel.borrow().is_some()
    }

    /// Give up the handle without unsubscribing.
    pub fn detach(self) {
        self.cancel.borrow_mut().take();
    }

    /// Unsubscribe an optional subscription, leaving `None` behind.
    pub fn release(slot: &mut Option<Subscription>) {
        if let Some(sub) = slot.take() {
            sub.unsubscribe();
        }
    }

    /// [`release`](Self::release) every slot.
    pub fn release_all<'a>(slots: impl IntoIterator<Item = &'a mut Option<Subscription>>) {
        for slot in slots {
            Self::release(slot);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raise_reaches_all_subscribers_in_order() {
        let event = Observable::<i32>::new();
        let log = Rc::new(RefCell::new(Vec::new()));

        let l1 = Rc::clone(&log);
        let _a = event.subscribe(move |v| l1.borrow_mut().push(('A', *v)));
        let l2 = Rc::clone(&log);
        let _b = event.subscribe(move |v| l2.borrow_mut().push(('B', *v)));

        event.raise(&7);
        assert_eq!(*log.borrow(), vec![('A', 7), ('B', 7)]);
    }

    #[test]
    fn unsubscribe_is_idempotent() {
        let event = Observable::<()>::new();
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        let sub = event.subscribe(move |()| h.set(h.get() + 1));
        let _other = event.subscribe(|()| {});
        assert_eq!(event.subscriber_count(), 2);

        sub.unsubscribe();
        sub.unsubscribe();
        assert_eq!(event.subscriber_count(), 1);
        assert!(!sub.is_active());

        event.raise(&());
        assert_eq!(hits.get(), 0);
    }

    #[test]
    fn drop_unsubscribes_and_detach_does_not() {
        let event = Observable::<()>::new();
        {
            let _sub = event.subscribe(|()| {});
            assert_eq!(event.subscriber_count(), 1);
        }
        assert_eq!(event.subscriber_count(), 0);

        event.subscribe(|()| {}).detach();
        assert_eq!(event.subscriber_count(), 1);
    }

    #[test]
    fn subscriber_added_during_raise_waits_for_next_raise() {
        let event = Observable::<()>::new();
        let late_hits = Rc::new(Cell::new(0));
        let holder: Rc<RefCell<Vec<Subscription>>> = Rc::new(RefCell::new(Vec::new()));

        let ev = event.clone();
        let hits = Rc::clone(&late_hits);
        let hold = Rc::clone(&holder);
        let _adder = event.subscribe(move |()| {
            let h = Rc::clone(&hits);
            hold.borrow_mut()
                .push(ev.subscribe(move |()| h.set(h.get() + 1)));
        });

        event.raise(&());
        assert_eq!(late_hits.get(), 0);
        event.raise(&());
        assert_eq!(late_hits.get(), 1);
    }

    #[test]
    fn subscriber_removed_during_raise_is_skipped() {
        let event = Observable::<()>::new();
        let victim_hits = Rc::new(Cell::new(0));
        let victim_slot: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));

        let slot = Rc::clone(&victim_slot);
        let _killer = event.subscribe(move |()| Subscription::release(&mut slot.borrow_mut()));
        let h = Rc::clone(&victim_hits);
        *victim_slot.borrow_mut() = Some(event.subscribe(move |()| h.set(h.get() + 1)));

        event.raise(&());
        assert_eq!(victim_hits.get(), 0);
        assert_eq!(event.subscriber_count(), 1);
    }

    #[test]
    fn panic_in_one_subscriber_still_runs_the_rest() {
        let event = Observable::<()>::new();
        let after = Rc::new(Cell::new(false));
        let _boom = event.subscribe(|()| panic!("subscriber failure"));
        let a = Rc::clone(&after);
        let _next = event.subscribe(move |()| a.set(true));

        let result = panic::catch_unwind(AssertUnwindSafe(|| event.raise(&())));
        assert!(result.is_err(), "panic must reach the raiser");
        assert!(after.get(), "later subscriber still ran");
    }

    #[test]
    fn release_helpers_tolerate_none() {
        let event = Observable::<()>::new();
        let mut slots = vec![Some(event.subscribe(|()| {})), None, Some(event.subscribe(|()| {}))];
        Subscription::release_all(slots.iter_mut());
        assert!(slots.iter().all(Option::is_none));
        assert!(event.is_empty());
    }

    #[test]
    fn combined_subscription_cancels_every_part() {
        let a = Observable::<()>::new();
        let b = Observable::<()>::new();
        let both = Subscription::all([a.subscribe(|()| {}), b.subscribe(|()| {})]);
        assert_eq!(a.subscriber_count() + b.subscriber_count(), 2);
        both.unsubscribe();
        assert!(a.is_empty() && b.is_empty());
    }

    #[test]
    fn clone_shares_subscribers() {
        let event = Observable::<u8>::new();
        let seen = Rc::new(Cell::new(0));
        let s = Rc::clone(&seen);
        let _sub = event.subscribe(move |v| s.set(*v));
        event.clone().raise(&9);
        assert_eq!(seen.get(), 9);
    }

    #[test]
    fn unsubscribe_after_event_dropped_is_harmless() {
        let event = Observable::<()>::new();
        let sub = event.subscribe(|()| {});
        drop(event);
        sub.unsubscribe();
        assert!(!sub.is_active());
    }
}
