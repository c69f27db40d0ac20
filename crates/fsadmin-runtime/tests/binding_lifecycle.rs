//! Bindings follow the attach/detach lifecycle of the node they live on.

use std::cell::RefCell;
use std::rc::Rc;

use fsadmin_runtime::reactive::{
    Binding, BindingSlot, BindingSource, BindingStore, CollectionView, Lifecycle,
    ObservableCollection, Property, Setter, TwoWayBinding, ViewNode,
};

fn text_sink() -> (Setter<String>, Rc<RefCell<Vec<String>>>) {
    let calls = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&calls);
    (
        Setter::new(move |v: &String| sink.borrow_mut().push(v.clone())),
        calls,
    )
}

#[test]
fn binding_set_before_attach_applies_once_then_stops_on_detach() {
    let node = ViewNode::new();
    let server_name = Property::new("vanilla".to_string());
    let (setter, calls) = text_sink();

    BindingStore::set(
        &node,
        BindingSlot::Tooltip,
        Binding::new(server_name.clone(), setter),
    );
    assert!(calls.borrow().is_empty());

    node.attach();
    assert_eq!(*calls.borrow(), ["vanilla"]);

    node.detach();
    server_name.set("modded".into());
    assert_eq!(*calls.borrow(), ["vanilla"]);
}

#[test]
fn reattach_pushes_latest_value() {
    let node = ViewNode::new();
    let status = Property::new("stopped".to_string());
    let (setter, calls) = text_sink();
    BindingStore::set(&node, BindingSlot::Text, Binding::new(status.clone(), setter));

    node.attach();
    node.detach();
    status.set("running".into());
    node.attach();
    status.set("stopping".into());

    assert_eq!(*calls.borrow(), ["stopped", "running", "stopping"]);
}

#[test]
fn store_listener_coexists_with_other_listeners() {
    struct Focus(Rc<RefCell<Vec<&'static str>>>);
    impl Lifecycle for Focus {
        fn on_attach(&self) {
            self.0.borrow_mut().push("focus+");
        }
        fn on_detach(&self) {
            self.0.borrow_mut().push("focus-");
        }
    }

    let order = Rc::new(RefCell::new(Vec::new()));
    let node = ViewNode::new();
    node.lifecycle().add(Rc::new(Focus(Rc::clone(&order))));

    let sink = Rc::clone(&order);
    let players = Property::new(0_u32);
    BindingStore::set(
        &node,
        BindingSlot::Value,
        Binding::new(players.map(|_| ()), Setter::new(move |_: &()| sink.borrow_mut().push("bind"))),
    );

    node.attach();
    node.detach();
    assert_eq!(*order.borrow(), ["focus+", "bind", "focus-"]);
}

#[test]
fn two_way_binding_on_a_node() {
    let node = ViewNode::new();
    let model = Property::new(25565_u16);
    let field = Property::new(0_u16);
    BindingStore::set(&node, BindingSlot::Value, TwoWayBinding::new(&model, &field).into());

    node.attach();
    assert_eq!(field.get(), 25565);
    field.set(34197);
    assert_eq!(model.get(), 34197);

    node.detach();
    field.set(1);
    assert_eq!(model.get(), 34197);
}

#[test]
fn items_source_binding_feeds_view_counts() {
    let saves = ObservableCollection::from_values(["a.zip", "b.zip"].map(String::from));
    let view = CollectionView::new(saves.clone());
    let count = Property::new(view.count());
    let c = count.clone();
    let v = view.clone();
    let _sub = view.subscribe(move |_| c.set(v.count()));

    let node = ViewNode::new();
    let (setter, calls) = text_sink();
    BindingStore::set(
        &node,
        BindingSlot::Title,
        Binding::new(count.map(|n| format!("{n} saves")), setter),
    );
    node.attach();
    saves.add(["c.zip".to_string()]);

    assert_eq!(*calls.borrow(), ["2 saves", "3 saves"]);
}
