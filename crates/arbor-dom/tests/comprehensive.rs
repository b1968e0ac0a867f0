//! Comprehensive tests for arbor-dom
//!
//! Tree edits, observers and custom element reactions through the public API.

use std::cell::RefCell;
use std::rc::Rc;

use arbor_dom::{
    CallbackKind, CustomElementConstructor, CustomElementState, DefinitionOptions, DocumentKind, DomError,
    DomTree, ElementOptions, LifecycleCallback, MutationCallback, MutationObserverInit, MutationRecord,
    MutationType, NodeId, ObserverId, ScriptError,
};

/// Collects every delivered batch
#[derive(Clone, Default)]
struct Batches(Rc<RefCell<Vec<Vec<MutationRecord>>>>);

impl MutationCallback for Batches {
    fn call(&self, _tree: &mut DomTree, records: Vec<MutationRecord>, _observer: ObserverId) -> Result<(), ScriptError> {
        self.0.borrow_mut().push(records);
        Ok(())
    }
}

impl Batches {
    fn flat(&self) -> Vec<MutationRecord> {
        self.0.borrow().iter().flatten().cloned().collect()
    }
}

/// Logs lifecycle callbacks as `name:kind`
struct Lifecycle {
    log: Rc<RefCell<Vec<String>>>,
}

impl CustomElementConstructor for Lifecycle {
    fn construct(&self, _tree: &mut DomTree, _element: NodeId) -> Result<(), ScriptError> {
        self.log.borrow_mut().push("construct".into());
        Ok(())
    }

    fn observed_attributes(&self) -> Vec<String> {
        vec!["state".into()]
    }

    fn lifecycle_callbacks(&self) -> Vec<CallbackKind> {
        vec![
            CallbackKind::Connected,
            CallbackKind::Disconnected,
            CallbackKind::Adopted,
            CallbackKind::AttributeChanged,
        ]
    }

    fn callback(&self, _tree: &mut DomTree, _element: NodeId, callback: &LifecycleCallback) -> Result<(), ScriptError> {
        let entry = match callback {
            LifecycleCallback::AttributeChanged { name, old_value, new_value, .. } => {
                format!("{name}:{old_value:?}->{new_value:?}")
            }
            other => format!("{:?}", other.kind()),
        };
        self.log.borrow_mut().push(entry);
        Ok(())
    }
}

fn setup() -> (DomTree, NodeId, NodeId) {
    let mut tree = DomTree::new();
    let doc = tree.create_document(DocumentKind::Html);
    let html = tree.create_element(doc, "html", ElementOptions::default()).unwrap();
    tree.append_child(doc, html).unwrap();
    (tree, doc, html)
}

fn div(tree: &mut DomTree, doc: NodeId) -> NodeId {
    tree.create_element(doc, "div", ElementOptions::default()).unwrap()
}

// ============================================================================
// TREE STRUCTURE
// ============================================================================

#[test]
fn test_sibling_order_follows_operations() {
    let (mut tree, doc, html) = setup();
    let a = div(&mut tree, doc);
    let b = div(&mut tree, doc);
    let c = div(&mut tree, doc);

    tree.append_child(html, c).unwrap();
    tree.insert_before(html, a, Some(c)).unwrap();
    tree.insert_before(html, b, Some(c)).unwrap();
    assert_eq!(tree.children(html), [a, b, c]);

    tree.append_child(html, a).unwrap();
    assert_eq!(tree.children(html), [b, c, a]);
    assert_eq!(tree.previous_sibling(a), Some(c));
    assert_eq!(tree.next_sibling(b), Some(c));
    assert_eq!(tree.index(a), Some(2));

    for node in tree.descendants(doc) {
        let parent = tree.parent(node).unwrap();
        assert_eq!(tree.children(parent).iter().filter(|&&n| n == node).count(), 1);
    }
}

#[test]
fn test_cycles_are_rejected() {
    let (mut tree, doc, html) = setup();
    let outer = div(&mut tree, doc);
    let inner = div(&mut tree, doc);
    tree.append_child(html, outer).unwrap();
    tree.append_child(outer, inner).unwrap();

    assert!(matches!(tree.append_child(inner, outer), Err(DomError::HierarchyRequest(_))));
    assert!(matches!(tree.append_child(outer, outer), Err(DomError::HierarchyRequest(_))));
    assert_eq!(tree.parent(outer), Some(html));
}

#[test]
fn test_remove_detaches_whole_subtree() {
    let (mut tree, doc, html) = setup();
    let section = div(&mut tree, doc);
    let child = div(&mut tree, doc);
    let text = tree.create_text_node(doc, "leaf");
    tree.append_child(html, section).unwrap();
    tree.append_child(section, child).unwrap();
    tree.append_child(child, text).unwrap();

    tree.remove(section);

    assert!(tree.children(html).is_empty());
    assert_eq!(tree.parent(section), None);
    assert_eq!(tree.root(text), section);
    assert!(!tree.is_connected(text));
    assert_eq!(tree.text_content(section), "leaf");
}

#[test]
fn test_fragment_insert_moves_children() {
    let (mut tree, doc, html) = setup();
    let fragment = tree.create_document_fragment(doc);
    let a = div(&mut tree, doc);
    let b = div(&mut tree, doc);
    tree.append_child(fragment, a).unwrap();
    tree.append_child(fragment, b).unwrap();

    let noop = |_: &mut DomTree, _: Vec<MutationRecord>, _: ObserverId| Ok::<_, ScriptError>(());
    let on_html = tree.create_mutation_observer(noop);
    let on_fragment = tree.create_mutation_observer(noop);
    let options = MutationObserverInit {
        child_list: true,
        ..Default::default()
    };
    tree.observe(on_html, html, options.clone()).unwrap();
    tree.observe(on_fragment, fragment, options).unwrap();

    tree.append_child(html, fragment).unwrap();
    assert_eq!(tree.children(html), [a, b]);
    assert!(tree.children(fragment).is_empty());

    let records = tree.take_records(on_html);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].mutation_type, MutationType::ChildList);
    assert_eq!(records[0].target, html);
    assert_eq!(records[0].added_nodes, [a, b]);
    assert!(records[0].removed_nodes.is_empty());

    let records = tree.take_records(on_fragment);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].target, fragment);
    assert_eq!(records[0].removed_nodes, [a, b]);
    assert!(records[0].added_nodes.is_empty());
}

#[test]
fn test_adopt_moves_between_documents() {
    let (mut tree, doc, html) = setup();
    let other = tree.create_document(DocumentKind::Html);
    let node = div(&mut tree, doc);
    let child = tree.create_text_node(doc, "x");
    tree.append_child(html, node).unwrap();
    tree.append_child(node, child).unwrap();

    tree.adopt_node(other, node).unwrap();
    assert_eq!(tree.parent(node), None);
    assert_eq!(tree.owner_document(node), other);
    assert_eq!(tree.owner_document(child), other);
    assert!(matches!(tree.adopt_node(other, doc), Err(DomError::NotSupported(_))));
}

#[test]
fn test_deep_clone_copies_attributes_and_children() {
    let (mut tree, doc, _) = setup();
    let node = div(&mut tree, doc);
    tree.set_attribute(node, "class", "box").unwrap();
    let text = tree.create_text_node(doc, "content");
    tree.append_child(node, text).unwrap();

    let copy = tree.clone_node(node, true).unwrap();
    assert_ne!(copy, node);
    assert_eq!(tree.get_attribute(copy, "class"), Some("box"));
    assert_eq!(tree.text_content(copy), "content");

    let shallow = tree.clone_node(node, false).unwrap();
    assert!(tree.children(shallow).is_empty());
}

// ============================================================================
// MUTATION OBSERVERS
// ============================================================================

#[test]
fn test_subtree_observer_sees_grandchild_append() {
    let (mut tree, doc, html) = setup();
    let a = div(&mut tree, doc);
    let b = div(&mut tree, doc);
    tree.append_child(html, a).unwrap();
    tree.append_child(a, b).unwrap();

    let batches = Batches::default();
    let observer = tree.create_mutation_observer(batches.clone());
    tree.observe(
        observer,
        a,
        MutationObserverInit {
            child_list: true,
            subtree: true,
            ..Default::default()
        },
    )
    .unwrap();

    let grandchild = div(&mut tree, doc);
    tree.append_child(b, grandchild).unwrap();
    tree.perform_microtask_checkpoint();

    let records = batches.flat();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].mutation_type, MutationType::ChildList);
    assert_eq!(records[0].target, b);
    assert_eq!(records[0].added_nodes, [grandchild]);
}

#[test]
fn test_records_are_batched_until_checkpoint() {
    let (mut tree, doc, html) = setup();
    let batches = Batches::default();
    let observer = tree.create_mutation_observer(batches.clone());
    tree.observe(
        observer,
        html,
        MutationObserverInit {
            child_list: true,
            ..Default::default()
        },
    )
    .unwrap();

    for _ in 0..3 {
        let node = div(&mut tree, doc);
        tree.append_child(html, node).unwrap();
    }
    assert!(batches.0.borrow().is_empty());
    assert!(tree.has_pending_microtasks());

    tree.perform_microtask_checkpoint();
    assert_eq!(batches.0.borrow().len(), 1);
    assert_eq!(batches.0.borrow()[0].len(), 3);
}

#[test]
fn test_disconnect_clears_records() {
    let (mut tree, doc, html) = setup();
    let batches = Batches::default();
    let observer = tree.create_mutation_observer(batches.clone());
    tree.observe(
        observer,
        html,
        MutationObserverInit {
            child_list: true,
            subtree: true,
            ..Default::default()
        },
    )
    .unwrap();

    let a = div(&mut tree, doc);
    tree.append_child(html, a).unwrap();
    tree.disconnect(observer);
    let b = div(&mut tree, doc);
    tree.append_child(html, b).unwrap();

    assert!(tree.take_records(observer).is_empty());
    tree.perform_microtask_checkpoint();
    assert!(batches.0.borrow().is_empty());
}

#[test]
fn test_same_value_attribute_set() {
    let (mut tree, doc, html) = setup();
    let node = div(&mut tree, doc);
    tree.append_child(html, node).unwrap();
    tree.set_attribute(node, "id", "a").unwrap();
    tree.set_attribute(node, "class", "c").unwrap();

    let observer = tree.create_mutation_observer(Batches::default());
    tree.observe(
        observer,
        node,
        MutationObserverInit {
            attribute_old_value: Some(true),
            ..Default::default()
        },
    )
    .unwrap();

    tree.set_attribute(node, "id", "a").unwrap();
    assert_eq!(tree.attribute_names(node), ["id", "class"]);

    let records = tree.take_records(observer);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].attribute_name.as_deref(), Some("id"));
    assert_eq!(records[0].old_value.as_deref(), Some("a"));
}

#[test]
fn test_attribute_filter() {
    let (mut tree, doc, _) = setup();
    let node = div(&mut tree, doc);
    let observer = tree.create_mutation_observer(Batches::default());
    tree.observe(
        observer,
        node,
        MutationObserverInit {
            attribute_filter: Some(vec!["hidden".into()]),
            ..Default::default()
        },
    )
    .unwrap();

    tree.set_attribute(node, "title", "x").unwrap();
    tree.toggle_attribute(node, "hidden", None).unwrap();

    let records = tree.take_records(observer);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].attribute_name.as_deref(), Some("hidden"));
    assert_eq!(records[0].old_value, None);
}

#[test]
fn test_removed_node_still_reports_until_delivery() {
    let (mut tree, doc, html) = setup();
    let a = div(&mut tree, doc);
    tree.append_child(html, a).unwrap();

    let batches = Batches::default();
    let observer = tree.create_mutation_observer(batches.clone());
    tree.observe(
        observer,
        html,
        MutationObserverInit {
            attributes: Some(true),
            child_list: true,
            subtree: true,
            ..Default::default()
        },
    )
    .unwrap();

    tree.remove(a);
    tree.set_attribute(a, "data-x", "1").unwrap();
    tree.perform_microtask_checkpoint();

    let records = batches.flat();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].removed_nodes, [a]);
    assert_eq!(records[1].target, a);

    // The transient registration is gone after delivery
    tree.set_attribute(a, "data-x", "2").unwrap();
    assert!(tree.take_records(observer).is_empty());
}

#[test]
fn test_observer_callback_can_mutate() {
    let (mut tree, doc, html) = setup();
    let seen = Rc::new(RefCell::new(0usize));
    let count = seen.clone();
    let observer = tree.create_mutation_observer(
        move |tree: &mut DomTree, records: Vec<MutationRecord>, _: ObserverId| -> Result<(), ScriptError> {
            *count.borrow_mut() += records.len();
            if *count.borrow() == 1 {
                let target = records[0].target;
                let doc = tree.owner_document(target);
                let extra = tree.create_element(doc, "span", ElementOptions::default())?;
                tree.append_child(target, extra)?;
            }
            Ok(())
        },
    );
    tree.observe(
        observer,
        html,
        MutationObserverInit {
            child_list: true,
            ..Default::default()
        },
    )
    .unwrap();

    let node = div(&mut tree, doc);
    tree.append_child(html, node).unwrap();
    tree.perform_microtask_checkpoint();

    assert_eq!(*seen.borrow(), 2);
    assert_eq!(tree.children(html).len(), 2);
}

// ============================================================================
// CUSTOM ELEMENTS
// ============================================================================

#[test]
fn test_define_upgrades_connected_elements() {
    let (mut tree, doc, html) = setup();
    let widget = tree.create_element(doc, "x-widget", ElementOptions::default()).unwrap();
    tree.set_attribute(widget, "state", "on").unwrap();
    tree.append_child(html, widget).unwrap();
    assert_eq!(tree.element(widget).unwrap().custom_element_state(), CustomElementState::Undefined);

    let log = Rc::new(RefCell::new(Vec::new()));
    tree.define("x-widget", Rc::new(Lifecycle { log: log.clone() }), DefinitionOptions::default())
        .unwrap();

    assert_eq!(tree.element(widget).unwrap().custom_element_state(), CustomElementState::Custom);
    assert_eq!(
        *log.borrow(),
        ["construct", "state:None->Some(\"on\")", "Connected"]
    );
}

#[test]
fn test_lifecycle_callbacks_follow_tree_changes() {
    let (mut tree, doc, html) = setup();
    let log = Rc::new(RefCell::new(Vec::new()));
    tree.define("x-life", Rc::new(Lifecycle { log: log.clone() }), DefinitionOptions::default())
        .unwrap();

    let element = tree.create_element(doc, "x-life", ElementOptions::default()).unwrap();
    tree.append_child(html, element).unwrap();
    tree.set_attribute(element, "state", "a").unwrap();
    tree.set_attribute(element, "ignored", "b").unwrap();
    tree.remove(element);

    let other = tree.create_document(DocumentKind::Html);
    tree.adopt_node(other, element).unwrap();

    assert_eq!(
        *log.borrow(),
        ["construct", "Connected", "state:None->Some(\"a\")", "Disconnected", "Adopted"]
    );
}

#[test]
fn test_connected_fires_for_descendants_in_tree_order() {
    let (mut tree, doc, html) = setup();
    let order = Rc::new(RefCell::new(Vec::new()));

    struct Named(Rc<RefCell<Vec<NodeId>>>);

    impl CustomElementConstructor for Named {
        fn construct(&self, _tree: &mut DomTree, _element: NodeId) -> Result<(), ScriptError> {
            Ok(())
        }

        fn lifecycle_callbacks(&self) -> Vec<CallbackKind> {
            vec![CallbackKind::Connected]
        }

        fn callback(&self, _tree: &mut DomTree, element: NodeId, _: &LifecycleCallback) -> Result<(), ScriptError> {
            self.0.borrow_mut().push(element);
            Ok(())
        }
    }

    tree.define("x-node", Rc::new(Named(order.clone())), DefinitionOptions::default())
        .unwrap();
    let root = tree.create_element(doc, "x-node", ElementOptions::default()).unwrap();
    let first = tree.create_element(doc, "x-node", ElementOptions::default()).unwrap();
    let nested = tree.create_element(doc, "x-node", ElementOptions::default()).unwrap();
    let second = tree.create_element(doc, "x-node", ElementOptions::default()).unwrap();
    tree.append_child(root, first).unwrap();
    tree.append_child(first, nested).unwrap();
    tree.append_child(root, second).unwrap();
    assert!(order.borrow().is_empty());

    tree.append_child(html, root).unwrap();
    assert_eq!(*order.borrow(), [root, first, nested, second]);
}

#[test]
fn test_customized_builtin_with_is() {
    let (mut tree, doc, html) = setup();
    let log = Rc::new(RefCell::new(Vec::new()));
    tree.define(
        "fancy-button",
        Rc::new(Lifecycle { log: log.clone() }),
        DefinitionOptions {
            extends: Some("button".into()),
        },
    )
    .unwrap();

    let button = tree
        .create_element(
            doc,
            "button",
            ElementOptions {
                is: Some("fancy-button".into()),
            },
        )
        .unwrap();
    tree.append_child(html, button).unwrap();

    let data = tree.element(button).unwrap();
    assert_eq!(data.local_name(), "button");
    assert_eq!(data.is_value(), Some("fancy-button"));
    assert_eq!(data.custom_element_state(), CustomElementState::Custom);
    assert_eq!(*log.borrow(), ["construct", "Connected"]);

    let plain = tree.create_element(doc, "fancy-button", ElementOptions::default()).unwrap();
    assert_ne!(tree.element(plain).unwrap().custom_element_state(), CustomElementState::Custom);
}

#[test]
fn test_template_contents_are_not_upgraded() {
    let (mut tree, doc, html) = setup();
    let log = Rc::new(RefCell::new(Vec::new()));
    tree.define("x-inert", Rc::new(Lifecycle { log: log.clone() }), DefinitionOptions::default())
        .unwrap();

    let template = tree.create_element(doc, "template", ElementOptions::default()).unwrap();
    tree.append_child(html, template).unwrap();
    let contents = tree.template_contents(template).unwrap();
    let owner = tree.owner_document(contents);
    let inert = tree.create_element(owner, "x-inert", ElementOptions::default()).unwrap();
    tree.append_child(contents, inert).unwrap();

    assert_ne!(tree.element(inert).unwrap().custom_element_state(), CustomElementState::Custom);
    assert!(log.borrow().is_empty());
}
