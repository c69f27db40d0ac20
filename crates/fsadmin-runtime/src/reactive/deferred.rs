#![forbid(unsafe_code)]

//! Guard against mutating a collection or view from inside its own change
//! handler.
//!
//! Every mutating entry point of a collection or view goes through
//! [`DeferredQueue::run_or_defer`], and every notification it raises runs
//! inside [`DeferredQueue::notify`]. While a notification is in flight, a
//! mutation request is either queued (applied FIFO right after the outermost
//! notification returns) or rejected with a panic, depending on the
//! [`ReentrancyPolicy`].
//!
//! # Invariants
//!
//! 1. A queued operation never runs while its owner is notifying.
//! 2. Queued operations run in request order.
//! 3. The notifying depth is restored even if a subscriber panics.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

use fsadmin_core::ReentrancyPolicy;

type Deferred = Box<dyn FnOnce()>;

/// Per-owner notification depth plus the queue of postponed mutations.
pub struct DeferredQueue {
    owner: &'static str,
    policy: Cell<ReentrancyPolicy>,
    depth: Cell<u32>,
    draining: Cell<bool>,
    pending: RefCell<VecDeque<Deferred>>,
}

impl std::fmt::Debug for DeferredQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeferredQueue")
            .field("owner", &self.owner)
            .field("policy", &self.policy.get())
            .field("depth", &self.depth.get())
            .field("pending", &self.pending.borrow().len())
            .finish()
    }
}

struct Restore<'a> {
    cell: &'a Cell<u32>,
}

impl Drop for Restore<'_> {
    fn drop(&mut self) {
        self.cell.set(self.cell.get() - 1);
    }
}

struct Draining<'a> {
    flag: &'a Cell<bool>,
}

impl Drop for Draining<'_> {
    fn drop(&mut self) {
        self.flag.set(false);
    }
}

impl DeferredQueue {
    /// Create a queue for the object named `owner` (used in logs and panics).
    #[must_use]
    pub fn new(owner: &'static str, policy: ReentrancyPolicy) -> Self {
        Self {
            owner,
            policy: Cell::new(policy),
            depth: Cell::new(0),
            draining: Cell::new(false),
            pending: RefCell::new(VecDeque::new()),
        }
    }

    /// Current policy.
    #[must_use]
    pub fn policy(&self) -> ReentrancyPolicy {
        self.policy.get()
    }

    /// Change the policy for subsequent requests.
    pub fn set_policy(&self, policy: ReentrancyPolicy) {
        self.policy.set(policy);
    }

    /// Whether a notification is in flight.
    #[must_use]
    pub fn is_notifying(&self) -> bool {
        self.depth.get() > 0
    }

    /// Number of queued operations.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.borrow().len()
    }

    /// Run `op` now, or handle it per policy if a notification is in flight.
    ///
    /// # Panics
    ///
    /// Panics under [`ReentrancyPolicy::Panic`] when called re-entrantly.
    pub fn run_or_defer(&self, op: impl FnOnce() + 'static) {
        if !self.is_notifying() {
            op();
            return;
        }
        match self.policy.get() {
            ReentrancyPolicy::Defer => self.enqueue(Box::new(op)),
            ReentrancyPolicy::Panic => panic!(
                "{} mutated from inside its own change notification",
                self.owner
            ),
        }
    }

    /// Like [`run_or_defer`](Self::run_or_defer) but always queues while
    /// notifying. Used for reactions to upstream events, which are not the
    /// subscriber's fault.
    pub(crate) fn run_or_queue(&self, op: impl FnOnce() + 'static) {
        if self.is_notifying() {
            self.enqueue(Box::new(op));
        } else {
            op();
        }
    }

    fn enqueue(&self, op: Deferred) {
        self.pending.borrow_mut().push_back(op);
        tracing::debug!(
            owner = self.owner,
            pending = self.pending_len(),
            "re-entrant mutation deferred"
        );
    }

    /// Run `f` as a notification. Queued operations are flushed once the
    /// outermost notification returns.
    pub fn notify<R>(&self, f: impl FnOnce() -> R) -> R {
        self.depth.set(self.depth.get() + 1);
        let result = {
            let _restore = Restore { cell: &self.depth };
            f()
        };
        if !self.is_notifying() {
            self.drain();
        }
        result
    }

    fn drain(&self) {
        if self.draining.get() {
            return;
        }
        self.draining.set(true);
        let _reset = Draining {
            flag: &self.draining,
        };
        loop {
            let next = self.pending.borrow_mut().pop_front();
            match next {
                Some(op) => op(),
                None => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{self, AssertUnwindSafe};
    use std::rc::Rc;

    #[test]
    fn runs_immediately_when_idle() {
        let queue = DeferredQueue::new("test", ReentrancyPolicy::Defer);
        let hit = Rc::new(Cell::new(false));
        let h = Rc::clone(&hit);
        queue.run_or_defer(move || h.set(true));
        assert!(hit.get());
    }

    #[test]
    fn defers_until_notification_ends() {
        let queue = Rc::new(DeferredQueue::new("test", ReentrancyPolicy::Defer));
        let log = Rc::new(RefCell::new(Vec::new()));

        let (q, l) = (Rc::clone(&queue), Rc::clone(&log));
        queue.notify(move || {
            let l1 = Rc::clone(&l);
            q.run_or_defer(move || l1.borrow_mut().push("first"));
            let l2 = Rc::clone(&l);
            q.run_or_defer(move || l2.borrow_mut().push("second"));
            assert_eq!(q.pending_len(), 2);
            l.borrow_mut().push("notify");
        });

        assert_eq!(*log.borrow(), vec!["notify", "first", "second"]);
        assert_eq!(queue.pending_len(), 0);
    }

    #[test]
    fn nested_notification_flushes_at_outermost() {
        let queue = Rc::new(DeferredQueue::new("test", ReentrancyPolicy::Defer));
        let hit = Rc::new(Cell::new(false));
        let (q, h) = (Rc::clone(&queue), Rc::clone(&hit));
        queue.notify(move || {
            let q2 = Rc::clone(&q);
            let h2 = Rc::clone(&h);
            q.notify(move || q2.run_or_defer(move || h2.set(true)));
            assert!(!h.get(), "inner notify must not flush");
        });
        assert!(hit.get());
    }

    #[test]
    fn panic_policy_rejects_reentrancy() {
        let queue = Rc::new(DeferredQueue::new("view", ReentrancyPolicy::Panic));
        let q = Rc::clone(&queue);
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            queue.notify(|| q.run_or_defer(|| {}));
        }));
        assert!(result.is_err());
        assert!(!queue.is_notifying(), "depth restored after unwind");
    }

    #[test]
    fn upstream_reactions_queue_under_panic_policy() {
        let queue = Rc::new(DeferredQueue::new("view", ReentrancyPolicy::Panic));
        let hit = Rc::new(Cell::new(false));
        let (q, h) = (Rc::clone(&queue), Rc::clone(&hit));
        queue.notify(move || q.run_or_queue(move || h.set(true)));
        assert!(hit.get());
    }
}
