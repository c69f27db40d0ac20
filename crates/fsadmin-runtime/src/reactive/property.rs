#![forbid(unsafe_code)]

//! Observable value holder used as the standard binding source.
//!
//! # Design
//!
//! [`Property<T>`] wraps a value in shared storage (`Rc<RefCell<..>>`) next
//! to an [`Observable<T>`] that is raised whenever the value changes, as
//! determined by `PartialEq`. Cloning a `Property` creates another handle to
//! the same value and the same subscribers.
//!
//! # Invariants
//!
//! 1. `version` increments by exactly 1 on each value-changing mutation.
//! 2. Writing a value equal to the current one is a no-op.
//! 3. Subscribers observe the new value; the borrow on the value is released
//!    before they run, so they may read the property again.

use std::cell::RefCell;
use std::rc::Rc;

use super::observable::{Observable, Subscription};

struct PropertyInner<T> {
    value: T,
    version: u64,
}

/// A shared, version-tracked value with change notification.
pub struct Property<T> {
    inner: Rc<RefCell<PropertyInner<T>>>,
    changed: Observable<T>,
}

impl<T> Clone for Property<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
            changed: self.changed.clone(),
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Property<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Property")
            .field("value", &inner.value)
            .field("version", &inner.version)
            .field("subscriber_count", &self.changed.subscriber_count())
            .finish()
    }
}

impl<T: Default + Clone + PartialEq + 'static> Default for Property<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Clone + PartialEq + 'static> Property<T> {
    /// Create a property holding `value` at version 0.
    #[must_use]
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(RefCell::new(PropertyInner { value, version: 0 })),
            changed: Observable::new(),
        }
    }

    /// Clone of the current value.
    #[must_use]
    pub fn get(&self) -> T {
        self.inner.borrow().value.clone()
    }

    /// Borrow the current value for the duration of `f`.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.borrow().value)
    }

    /// Store `value` and notify subscribers if it differs from the current one.
    pub fn set(&self, value: T) {
        {
            let mut inner = self.inner.borrow_mut();
            if inner.value == value {
                return;
            }
            inner.value = value.clone();
            inner.version += 1;
        }
        self.changed.raise(&value);
    }

    /// Mutate in place; notifies only if the result differs from before.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        let next = {
            let mut inner = self.inner.borrow_mut();
            let old = inner.value.clone();
            f(&mut inner.value);
            if inner.value == old {
                return;
            }
            inner.version += 1;
            inner.value.clone()
        };
        self.changed.raise(&next);
    }

    /// Subscribe to value changes.
    pub fn subscribe(&self, callback: impl Fn(&T) + 'static) -> Subscription {
        self.changed.subscribe(callback)
    }

    /// Number of value-changing mutations so far.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.borrow().version
    }

    /// Number of active change subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.changed.subscriber_count()
    }
}
