#![forbid(unsafe_code)]

//! Reactive state engine for the server admin views.
//!
//! This module provides the primitives every admin view is built on:
//!
//! - [`Observable`]: synchronous pub-sub event with RAII [`Subscription`]s.
//! - [`Property`]: a shared value plus change notification; the standard
//!   binding source.
//! - [`BoxId`] / [`BoxArena`]: stable item identity decoupled from item
//!   content.
//! - [`ObservableCollection`] / [`ObservableKeyArray`]: ordered, observable
//!   item storage that applies transport [`Delta`]s and raises one
//!   normalized [`CollectionChange`] per mutation.
//! - [`CollectionView`]: an independently sorted, filtered and selectable
//!   projection of a collection that raises minimal [`ViewChange`]s.
//! - [`Binding`] / [`TwoWayBinding`] / [`BindingStore`]: connectable property
//!   wiring, gated on a [`ViewNode`]'s attach/detach [`Lifecycle`].
//!
//! # Architecture
//!
//! Everything is single-threaded and synchronous: handles are `Rc`-shared,
//! state sits in `RefCell`s, and a mutation has fully completed (including
//! every notification it triggers) before control returns to the caller.
//! Views reach their source through the [`CollectionSource`] trait and hold
//! only a `Weak` back-reference in their source subscription, so dropping a
//! view detaches it.
//!
//! Mutations requested from inside a change handler of the same object go
//! through a [`DeferredQueue`] and are applied after the in-flight
//! notification, or rejected, per
//! [`ReentrancyPolicy`](fsadmin_core::ReentrancyPolicy).
//!
//! # Invariants
//!
//! 1. Subscribers are notified in registration order, against a snapshot
//!    taken when the raise began.
//! 2. Each collection mutation raises exactly one change event, or none if
//!    nothing changed.
//! 3. A view's order is always the filtered source order, sorted by the
//!    active specs with ties in source order.
//! 4. A view's selection is always a subset of its visible boxes.

pub mod binding;
pub mod binding_store;
pub mod boxed;
pub mod change;
pub mod collection;
pub mod collection_view;
pub mod deferred;
pub mod delta;
pub mod key_array;
pub mod lifecycle;
pub mod observable;
pub mod property;
pub mod sort;
pub mod source;

pub use binding::{Binding, BindingSource, BindingTarget, Mapped, Setter, TwoWayBinding};
pub use binding_store::{BindingSlot, BindingStore};
pub use boxed::{BoxArena, BoxId};
pub use change::{ChangeKind, CollectionChange, ViewChange, ViewChangeKind};
pub use collection::ObservableCollection;
pub use collection_view::CollectionView;
pub use deferred::DeferredQueue;
pub use delta::{Delta, DeltaError, DeltaKind};
pub use key_array::ObservableKeyArray;
pub use lifecycle::{Lifecycle, LifecycleDispatcher, NodeId, ViewNode};
pub use observable::{Observable, Subscription};
pub use property::Property;
pub use sort::{SortDescriptor, SortSpec};
pub use source::CollectionSource;
