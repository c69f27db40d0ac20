#![forbid(unsafe_code)]

//! Attach/detach signalling for view-tree nodes.
//!
//! # Design
//!
//! A view node does not inherit lifecycle behaviour; it owns a
//! [`LifecycleDispatcher`] and anything that needs to react to the node
//! entering or leaving the tree registers a [`Lifecycle`] listener on it.
//! The host that owns the real tree calls [`ViewNode::attach`] and
//! [`ViewNode::detach`] once per transition.
//!
//! # Invariants
//!
//! 1. Listeners see strictly alternating `on_attach`/`on_detach` calls,
//!    starting with `on_attach`.
//! 2. Attach runs listeners in registration order; detach runs them in
//!    reverse.
//! 3. A listener registered while the node is attached is attached
//!    immediately.
//!
//! # Failure Modes
//!
//! - A duplicate attach or detach from the host is logged at `warn` and
//!   ignored.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::binding_store::BindingStore;

/// Reacts to a view node entering or leaving the tree.
pub trait Lifecycle {
    fn on_attach(&self);
    fn on_detach(&self);
}

/// Fan-out of attach/detach signals to registered listeners.
#[derive(Default)]
pub struct LifecycleDispatcher {
    listeners: RefCell<Vec<Rc<dyn Lifecycle>>>,
    attached: Cell<bool>,
}

impl std::fmt::Debug for LifecycleDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleDispatcher")
            .field("listeners", &self.listener_count())
            .field("attached", &self.attached.get())
            .finish()
    }
}

impl LifecycleDispatcher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener`. If already attached, it is attached now.
    pub fn add(&self, listener: Rc<dyn Lifecycle>) {
        self.listeners.borrow_mut().push(Rc::clone(&listener));
        if self.attached.get() {
            listener.on_attach();
        }
    }

    /// Unregister `listener` (by pointer identity). Detaches it first if the
    /// dispatcher is attached. Returns whether it was registered.
    pub fn remove(&self, listener: &Rc<dyn Lifecycle>) -> bool {
        let removed = {
            let mut listeners = self.listeners.borrow_mut();
            let before = listeners.len();
            listeners.retain(|l| !Rc::ptr_eq(l, listener));
            listeners.len() != before
        };
        if removed && self.attached.get() {
            listener.on_detach();
        }
        removed
    }

    pub fn attach(&self) {
        if self.attached.replace(true) {
            tracing::warn!("attach of an already attached node ignored");
            return;
        }
        let listeners = self.listeners.borrow().clone();
        for listener in &listeners {
            listener.on_attach();
        }
    }

    pub fn detach(&self) {
        if !self.attached.replace(false) {
            tracing::warn!("detach of a node that is not attached ignored");
            return;
        }
        let listeners = self.listeners.borrow().clone();
        for listener in listeners.iter().rev() {
            listener.on_detach();
        }
    }

    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.attached.get()
    }

    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }
}

static NODE_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identity of a [`ViewNode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    fn next() -> Self {
        Self(NODE_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    #[inline]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

struct NodeInner {
    id: NodeId,
    lifecycle: LifecycleDispatcher,
    store: RefCell<Option<Rc<BindingStore>>>,
}

/// Handle to one node of the host's view tree.
///
/// Cloning shares the node.
#[derive(Clone)]
pub struct ViewNode {
    inner: Rc<NodeInner>,
}

impl std::fmt::Debug for ViewNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewNode")
            .field("id", &self.inner.id)
            .field("attached", &self.is_attached())
            .field("bindings", &self.bindings().map_or(0, |s| s.len()))
            .finish()
    }
}

impl Default for ViewNode {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewNode {
    /// Detached node with no listeners.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(NodeInner {
                id: NodeId::next(),
                lifecycle: LifecycleDispatcher::new(),
                store: RefCell::new(None),
            }),
        }
    }

    #[must_use]
    pub fn id(&self) -> NodeId {
        self.inner.id
    }

    /// The node entered the tree.
    pub fn attach(&self) {
        tracing::debug!(node = %self.inner.id, "attach");
        self.inner.lifecycle.attach();
    }

    /// The node left the tree.
    pub fn detach(&self) {
        tracing::debug!(node = %self.inner.id, "detach");
        self.inner.lifecycle.detach();
    }

    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.inner.lifecycle.is_attached()
    }

    #[must_use]
    pub fn lifecycle(&self) -> &LifecycleDispatcher {
        &self.inner.lifecycle
    }

    /// The node's binding store, if any binding was ever set on it.
    #[must_use]
    pub fn bindings(&self) -> Option<Rc<BindingStore>> {
        self.inner.store.borrow().clone()
    }

    /// The node's binding store, created and registered on first use.
    pub(crate) fn bindings_or_init(&self) -> Rc<BindingStore> {
        if let Some(store) = self.bindings() {
            return store;
        }
        let store = Rc::new(BindingStore::new());
        *self.inner.store.borrow_mut() = Some(Rc::clone(&store));
        let listener: Rc<dyn Lifecycle> = store.clone();
        self.inner.lifecycle.add(listener);
        store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    struct Recorder {
        name: &'static str,
        log: Rc<RefCell<Vec<String>>>,
    }

    impl Lifecycle for Recorder {
        fn on_attach(&self) {
            self.log.borrow_mut().push(format!("+{}", self.name));
        }
        fn on_detach(&self) {
            self.log.borrow_mut().push(format!("-{}", self.name));
        }
    }

    fn recorder(name: &'static str, log: &Rc<RefCell<Vec<String>>>) -> Rc<dyn Lifecycle> {
        Rc::new(Recorder {
            name,
            log: Rc::clone(log),
        })
    }

    #[test]
    fn attach_in_order_detach_in_reverse() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let node = ViewNode::new();
        node.lifecycle().add(recorder("a", &log));
        node.lifecycle().add(recorder("b", &log));

        node.attach();
        node.detach();
        assert_eq!(*log.borrow(), vec!["+a", "+b", "-b", "-a"]);
    }

    #[test]
    fn late_listener_attaches_immediately() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let node = ViewNode::new();
        node.attach();
        node.lifecycle().add(recorder("late", &log));
        assert_eq!(*log.borrow(), vec!["+late"]);
    }

    #[test]
    fn removing_attached_listener_detaches_it() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let node = ViewNode::new();
        let listener = recorder("x", &log);
        node.lifecycle().add(Rc::clone(&listener));
        node.attach();
        assert!(node.lifecycle().remove(&listener));
        assert!(!node.lifecycle().remove(&listener));
        node.detach();
        assert_eq!(*log.borrow(), vec!["+x", "-x"]);
    }

    #[test]
    #[traced_test]
    fn duplicate_transitions_are_ignored() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let node = ViewNode::new();
        node.lifecycle().add(recorder("a", &log));
        node.detach();
        node.attach();
        node.attach();
        assert_eq!(*log.borrow(), vec!["+a"]);
        assert!(logs_contain("already attached"));
        assert!(logs_contain("not attached"));
    }

    #[test]
    fn node_ids_are_unique() {
        assert_ne!(ViewNode::new().id(), ViewNode::new().id());
    }
}
