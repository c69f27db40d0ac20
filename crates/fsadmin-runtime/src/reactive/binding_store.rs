#![forbid(unsafe_code)]

//! Per-node registry of bindings, gated on attach/detach.
//!
//! Each [`ViewNode`] owns at most one [`BindingStore`], created the first
//! time a binding is set on it. The store maps a [`BindingSlot`] (which
//! property of the node is bound) to the active [`Binding`] and connects or
//! disconnects all of them as the node enters or leaves the tree.
//!
//! # Invariants
//!
//! 1. At most one binding per slot; replacing a slot disconnects the
//!    previous binding before the new one can connect.
//! 2. While the node is attached, every stored binding is connected; while
//!    detached, none is.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

use super::binding::Binding;
use super::lifecycle::{Lifecycle, ViewNode};

/// Which property of a view node a binding drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BindingSlot {
    Text,
    Value,
    Tooltip,
    Placeholder,
    Title,
    Disabled,
    Hidden,
    Selected,
    /// Collection feeding a list, table or select.
    ItemsSource,
    ClassName,
}

impl BindingSlot {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Value => "value",
            Self::Tooltip => "tooltip",
            Self::Placeholder => "placeholder",
            Self::Title => "title",
            Self::Disabled => "disabled",
            Self::Hidden => "hidden",
            Self::Selected => "selected",
            Self::ItemsSource => "items_source",
            Self::ClassName => "class_name",
        }
    }
}

impl std::fmt::Display for BindingSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The bindings of one view node.
#[derive(Debug, Default)]
pub struct BindingStore {
    bindings: RefCell<BTreeMap<BindingSlot, Binding>>,
    attached: Cell<bool>,
}

impl BindingStore {
    /// Detached, empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `slot` of `node`, replacing any previous binding there. Connects
    /// immediately if the node is attached.
    pub fn set(node: &ViewNode, slot: BindingSlot, binding: Binding) {
        node.bindings_or_init().insert(slot, binding);
    }

    /// The store of `node`, if it has ever had a binding.
    #[must_use]
    pub fn get(node: &ViewNode) -> Option<Rc<BindingStore>> {
        node.bindings()
    }

    /// Store `binding` under `slot`, disconnecting the one it replaces.
    /// Storing the binding already held there (a clone of it) is a no-op.
    pub fn insert(&self, slot: BindingSlot, binding: Binding) {
        let previous = self.bindings.borrow_mut().insert(slot, binding.clone());
        match previous {
            Some(previous) if previous.ptr_eq(&binding) => {
                tracing::trace!(%slot, "binding re-set under its own slot");
            }
            Some(previous) => {
                tracing::debug!(%slot, "binding replaced");
                previous.disconnected();
            }
            None => {}
        }
        if self.attached.get() {
            binding.connected();
        }
    }

    /// Disconnect and drop the binding under `slot`.
    pub fn remove(&self, slot: BindingSlot) -> Option<Binding> {
        let removed = self.bindings.borrow_mut().remove(&slot);
        if let Some(binding) = &removed {
            binding.disconnected();
        }
        removed
    }

    /// The binding under `slot`.
    #[must_use]
    pub fn binding(&self, slot: BindingSlot) -> Option<Binding> {
        self.bindings.borrow().get(&slot).cloned()
    }

    /// Bound slots in slot order.
    #[must_use]
    pub fn slots(&self) -> Vec<BindingSlot> {
        self.bindings.borrow().keys().copied().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.borrow().is_empty()
    }

    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.attached.get()
    }

    /// Connect every stored binding.
    pub fn connected(&self) {
        self.attached.set(true);
        for binding in self.snapshot() {
            binding.connected();
        }
    }

    /// Disconnect every stored binding.
    pub fn disconnected(&self) {
        self.attached.set(false);
        for binding in self.snapshot() {
            binding.disconnected();
        }
    }

    // Bindings may touch the store while connecting, so never hold the map
    // borrow across a callback.
    fn snapshot(&self) -> Vec<Binding> {
        self.bindings.borrow().values().cloned().collect()
    }
}

impl Lifecycle for BindingStore {
    fn on_attach(&self) {
        self.connected();
    }

    fn on_detach(&self) {
        self.disconnected();
    }
}
