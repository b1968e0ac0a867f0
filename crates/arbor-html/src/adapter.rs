//! Parser Adapter
//!
//! The tree-construction surface a streaming tokenizer drives. Every call
//! goes through the regular tree operations, so observers and custom element
//! reactions see parser-built content exactly like script-built content.

use std::collections::HashMap;

use arbor_dom::{DomError, DomResult, DomTree, NodeId, QuirksMode};

/// Attribute as produced by the tokenizer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserAttribute {
    /// Local name
    pub name: String,
    pub value: String,
    pub prefix: Option<String>,
    pub namespace: Option<String>,
}

impl ParserAttribute {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            prefix: None,
            namespace: None,
        }
    }
}

/// Parser configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParserOptions {
    pub scripting_enabled: bool,
    /// Fragment parsing never runs custom element constructors synchronously
    pub fragment: bool,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            scripting_enabled: true,
            fragment: false,
        }
    }
}

/// Streaming tree-construction adapter over a [`DomTree`]
#[derive(Debug)]
pub struct ParserAdapter {
    tree: DomTree,
    document: NodeId,
    options: ParserOptions,
    /// Top of the tokenizer's open element stack
    current_element: Option<NodeId>,
    /// Deferred elements awaiting insertion, with their token attributes
    pending: HashMap<NodeId, Vec<ParserAttribute>>,
}

impl ParserAdapter {
    pub fn new(tree: DomTree, document: NodeId, options: ParserOptions) -> Self {
        Self {
            tree,
            document,
            options,
            current_element: None,
            pending: HashMap::new(),
        }
    }

    pub fn tree(&self) -> &DomTree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut DomTree {
        &mut self.tree
    }

    pub fn into_tree(self) -> DomTree {
        self.tree
    }

    pub fn options(&self) -> ParserOptions {
        self.options
    }

    pub fn current_element(&self) -> Option<NodeId> {
        self.current_element
    }

    /// Document that new nodes belong to
    ///
    /// Inside a template this is the template contents owner document.
    fn owner_document(&self) -> NodeId {
        let Some(current) = self.current_element else {
            return self.document;
        };
        match self.tree.template_contents(current) {
            Some(contents) => self.tree.owner_document(contents),
            None => self.tree.owner_document(current),
        }
    }

    /// The document being parsed into
    pub fn create_document(&self) -> NodeId {
        self.document
    }

    pub fn create_document_fragment(&mut self) -> NodeId {
        let document = self.owner_document();
        self.tree.create_document_fragment(document)
    }

    /// Create an element, running a matching custom element constructor now
    /// unless parsing a fragment or with scripting disabled
    pub fn create_element(&mut self, local_name: &str, namespace: &str, attrs: Vec<ParserAttribute>) -> NodeId {
        let document = self.owner_document();
        let namespace = (!namespace.is_empty()).then_some(namespace);
        let is = find_is_value(&attrs);

        if !self.will_execute_script(document, namespace, local_name, is.as_deref()) {
            let element = self
                .tree
                .create_element_for_token(document, local_name, namespace, is.as_deref(), false);
            self.adopt_attributes(element, attrs);
            return element;
        }

        tracing::debug!("Running constructor for <{}> during parse", local_name);
        self.construct_with_attributes(document, attrs, |tree| {
            tree.create_element_for_token(document, local_name, namespace, is.as_deref(), true)
        })
    }

    /// Create an element whose insertion point is not known yet
    ///
    /// Custom element construction and attributes wait until the element is
    /// inserted with [`ParserAdapter::insert_element`], where the parent
    /// decides the document.
    pub fn create_element_deferred(&mut self, local_name: &str, namespace: &str, attrs: Vec<ParserAttribute>) -> NodeId {
        let namespace = (!namespace.is_empty()).then_some(namespace);
        let is = find_is_value(&attrs);
        let element = self
            .tree
            .create_unconstructed_element(self.document, local_name, namespace, is.as_deref());
        self.pending.insert(element, attrs);
        element
    }

    /// Insert `node` into `parent` before `reference`, finishing a deferred
    /// element against the parent's document first
    pub fn insert_element(&mut self, parent: NodeId, node: NodeId, reference: Option<NodeId>) -> DomResult<()> {
        self.resolve_deferred(node, parent);
        self.tree.insert_before(parent, node, reference).map(drop)
    }

    /// Give deferred elements that were never inserted their attributes
    pub fn flush_deferred(&mut self) {
        let pending: Vec<_> = self.pending.drain().collect();
        for (element, attrs) in pending {
            self.adopt_attributes(element, attrs);
        }
    }

    fn resolve_deferred(&mut self, element: NodeId, parent: NodeId) {
        let Some(attrs) = self.pending.remove(&element) else {
            return;
        };
        let document = self.tree.owner_document(parent);
        let will_execute_script = self.tree.element(element).is_some_and(|data| {
            self.will_execute_script(document, data.namespace(), data.local_name(), data.is_value())
        });
        if !will_execute_script {
            self.adopt_attributes(element, attrs);
            return;
        }

        tracing::debug!(?element, "Running constructor before insertion");
        self.construct_with_attributes(document, attrs, |tree| {
            tree.construct_for_token(document, element);
            element
        });
    }

    fn will_execute_script(&self, document: NodeId, namespace: Option<&str>, local_name: &str, is: Option<&str>) -> bool {
        !self.options.fragment
            && self.options.scripting_enabled
            && self.tree.lookup_definition(document, namespace, local_name, is).is_some()
    }

    /// Run `construct` inside a reaction scope with dynamic markup insertion
    /// blocked, then add the token's attributes
    fn construct_with_attributes(
        &mut self,
        document: NodeId,
        attrs: Vec<ParserAttribute>,
        construct: impl FnOnce(&mut DomTree) -> NodeId,
    ) -> NodeId {
        self.tree.perform_microtask_checkpoint();
        self.tree.increment_throw_on_dynamic_markup_insertion(document);
        let element = self.tree.with_reactions(|tree| {
            let element = construct(tree);
            add_missing_attributes(tree, element, attrs);
            element
        });
        self.tree.decrement_throw_on_dynamic_markup_insertion(document);
        element
    }

    pub fn create_comment_node(&mut self, data: &str) -> NodeId {
        let document = self.owner_document();
        self.tree.create_comment(document, data)
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> DomResult<()> {
        self.insert_element(parent, child, None)
    }

    pub fn insert_before(&mut self, parent: NodeId, child: NodeId, reference: NodeId) -> DomResult<()> {
        self.insert_element(parent, child, Some(reference))
    }

    /// Replace a template's contents with a tokenizer-built fragment
    pub fn set_template_content(&mut self, template: NodeId, fragment: NodeId) -> DomResult<()> {
        self.tree.set_template_contents(template, fragment)
    }

    pub fn get_template_content(&self, template: NodeId) -> DomResult<NodeId> {
        self.tree
            .template_contents(template)
            .ok_or(DomError::InvalidState("node is not a template element"))
    }

    /// Update the existing doctype in place, or append a new one
    pub fn set_document_type(
        &mut self,
        document: NodeId,
        name: &str,
        public_id: &str,
        system_id: &str,
    ) -> DomResult<()> {
        match self.tree.doctype(document) {
            Some(doctype) => {
                self.tree.set_doctype_data(doctype, name, public_id, system_id);
                Ok(())
            }
            None => {
                let doctype = self.tree.create_doctype(document, name, public_id, system_id);
                self.append_child(document, doctype)
            }
        }
    }

    pub fn set_document_mode(&mut self, document: NodeId, mode: QuirksMode) {
        self.tree.set_quirks_mode(document, mode);
    }

    pub fn detach_node(&mut self, node: NodeId) {
        self.tree.remove(node);
    }

    /// Append text, merging into a trailing Text node
    pub fn insert_text(&mut self, parent: NodeId, text: &str) -> DomResult<()> {
        if let Some(last) = self.tree.last_child(parent)
            && self.tree.node(last).is_text()
        {
            return self.tree.append_data(last, text);
        }
        let document = self.tree.owner_document(parent);
        let node = self.tree.create_text_node(document, text);
        self.append_child(parent, node)
    }

    /// Insert text before `reference`, merging into a preceding Text node
    pub fn insert_text_before(&mut self, parent: NodeId, text: &str, reference: NodeId) -> DomResult<()> {
        if let Some(previous) = self.tree.previous_sibling(reference)
            && self.tree.node(previous).is_text()
        {
            return self.tree.append_data(previous, text);
        }
        let document = self.tree.owner_document(parent);
        let node = self.tree.create_text_node(document, text);
        self.insert_before(parent, node, reference)
    }

    /// Add the attributes the element does not have yet
    pub fn adopt_attributes(&mut self, element: NodeId, attrs: Vec<ParserAttribute>) {
        self.tree.with_reactions(|tree| add_missing_attributes(tree, element, attrs));
    }

    pub fn on_item_push(&mut self, item: NodeId) {
        self.current_element = Some(item);
    }

    pub fn on_item_pop(&mut self, _item: NodeId, new_top: Option<NodeId>) {
        self.current_element = new_top.filter(|&n| self.tree.node(n).is_element());
    }
}

fn find_is_value(attrs: &[ParserAttribute]) -> Option<String> {
    attrs
        .iter()
        .find(|a| a.name == "is" && a.namespace.is_none())
        .map(|a| a.value.clone())
}

fn add_missing_attributes(tree: &mut DomTree, element: NodeId, attrs: Vec<ParserAttribute>) {
    for attr in attrs {
        if tree
            .get_attribute_ns(element, attr.namespace.as_deref(), &attr.name)
            .is_none()
        {
            tree.set_attribute_value(element, &attr.name, &attr.value, attr.prefix, attr.namespace);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    use arbor_dom::{
        CustomElementConstructor, CustomElementState, DefinitionOptions, DocumentKind, MutationObserverInit,
        MutationRecord, MutationType, NodeData, ObserverId, ScriptError, ns,
    };

    fn adapter() -> ParserAdapter {
        let mut tree = DomTree::new();
        let document = tree.create_document(DocumentKind::Html);
        ParserAdapter::new(tree, document, ParserOptions::default())
    }

    #[test]
    fn test_insert_text_merges() {
        let mut adapter = adapter();
        let document = adapter.create_document();
        let body = adapter.create_element("body", ns::HTML, Vec::new());
        adapter.append_child(document, body).unwrap();

        adapter.insert_text(body, "ab").unwrap();
        adapter.insert_text(body, "cd").unwrap();

        let tree = adapter.tree();
        assert_eq!(tree.children(body).len(), 1);
        assert_eq!(tree.data(tree.children(body)[0]), Some("abcd"));
    }

    #[test]
    fn test_insert_text_merge_is_a_character_data_change() {
        let mut adapter = adapter();
        let document = adapter.create_document();
        let body = adapter.create_element("body", ns::HTML, Vec::new());
        adapter.append_child(document, body).unwrap();
        adapter.insert_text(body, "ab").unwrap();

        let tree = adapter.tree_mut();
        let observer =
            tree.create_mutation_observer(|_: &mut DomTree, _: Vec<MutationRecord>, _: ObserverId| Ok::<_, ScriptError>(()));
        tree.observe(
            observer,
            body,
            MutationObserverInit {
                child_list: true,
                character_data: Some(true),
                subtree: true,
                ..Default::default()
            },
        )
        .unwrap();

        adapter.insert_text(body, "cd").unwrap();
        let records = adapter.tree_mut().take_records(observer);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].mutation_type, MutationType::CharacterData);
    }

    #[test]
    fn test_insert_text_before() {
        let mut adapter = adapter();
        let document = adapter.create_document();
        let body = adapter.create_element("body", ns::HTML, Vec::new());
        let p = adapter.create_element("p", ns::HTML, Vec::new());
        adapter.append_child(document, body).unwrap();
        adapter.append_child(body, p).unwrap();

        adapter.insert_text_before(body, "x", p).unwrap();
        adapter.insert_text_before(body, "y", p).unwrap();

        let tree = adapter.tree();
        assert_eq!(tree.children(body).len(), 2);
        assert_eq!(tree.text_content(body), "xy");
    }

    #[test]
    fn test_set_document_type_updates_in_place() {
        let mut adapter = adapter();
        let document = adapter.create_document();

        adapter.set_document_type(document, "html", "", "").unwrap();
        let doctype = adapter.tree().doctype(document).unwrap();
        adapter.set_document_type(document, "html", "-//W3C//DTD HTML 4.01//EN", "").unwrap();

        let tree = adapter.tree();
        assert_eq!(tree.doctype(document), Some(doctype));
        assert_eq!(tree.children(document).len(), 1);
        match tree.node(doctype).data() {
            NodeData::Doctype(data) => assert_eq!(data.public_id, "-//W3C//DTD HTML 4.01//EN"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_template_owner_document_tracking() {
        let mut adapter = adapter();
        let document = adapter.create_document();
        let template = adapter.create_element("template", ns::HTML, Vec::new());
        adapter.append_child(document, template).unwrap();
        adapter.on_item_push(template);

        let inner = adapter.create_element("div", ns::HTML, Vec::new());
        let contents = adapter.get_template_content(template).unwrap();
        assert_eq!(adapter.tree().owner_document(inner), adapter.tree().owner_document(contents));
        assert_ne!(adapter.tree().owner_document(inner), document);

        adapter.on_item_pop(template, None);
        let outer = adapter.create_element("div", ns::HTML, Vec::new());
        assert_eq!(adapter.tree().owner_document(outer), document);
    }

    #[test]
    fn test_set_template_content_errors() {
        let mut adapter = adapter();
        let div = adapter.create_element("div", ns::HTML, Vec::new());
        let fragment = adapter.create_document_fragment();

        assert!(matches!(adapter.set_template_content(div, fragment), Err(DomError::InvalidState(_))));
        assert!(matches!(adapter.get_template_content(div), Err(DomError::InvalidState(_))));
    }

    #[test]
    fn test_adopt_attributes_keeps_existing() {
        let mut adapter = adapter();
        let html = adapter.create_element("html", ns::HTML, vec![ParserAttribute::new("lang", "en")]);

        adapter.adopt_attributes(
            html,
            vec![ParserAttribute::new("lang", "fr"), ParserAttribute::new("dir", "ltr")],
        );
        let tree = adapter.tree();
        assert_eq!(tree.get_attribute(html, "lang"), Some("en"));
        assert_eq!(tree.get_attribute(html, "dir"), Some("ltr"));
    }

    /// Records whether the element had a parent when constructed
    struct SeesParent(Rc<RefCell<Vec<bool>>>);

    impl CustomElementConstructor for SeesParent {
        fn construct(&self, tree: &mut DomTree, element: NodeId) -> Result<(), ScriptError> {
            self.0.borrow_mut().push(tree.parent(element).is_some());
            Ok(())
        }
    }

    #[test]
    fn test_deferred_element_constructed_on_insertion() {
        let mut adapter = adapter();
        let document = adapter.create_document();
        let log = Rc::new(RefCell::new(Vec::new()));
        adapter
            .tree_mut()
            .define("x-item", Rc::new(SeesParent(log.clone())), DefinitionOptions::default())
            .unwrap();
        let body = adapter.create_element("body", ns::HTML, Vec::new());
        adapter.append_child(document, body).unwrap();

        let item = adapter.create_element_deferred("x-item", ns::HTML, vec![ParserAttribute::new("id", "a")]);
        assert!(log.borrow().is_empty());
        assert_eq!(adapter.tree().get_attribute(item, "id"), None);

        adapter.insert_element(body, item, None).unwrap();
        assert_eq!(*log.borrow(), [false]);
        let tree = adapter.tree();
        assert_eq!(tree.element(item).unwrap().custom_element_state(), CustomElementState::Custom);
        assert_eq!(tree.get_attribute(item, "id"), Some("a"));
    }

    #[test]
    fn test_deferred_element_in_template_stays_inert() {
        let mut adapter = adapter();
        let document = adapter.create_document();
        let log = Rc::new(RefCell::new(Vec::new()));
        adapter
            .tree_mut()
            .define("x-item", Rc::new(SeesParent(log.clone())), DefinitionOptions::default())
            .unwrap();
        let template = adapter.create_element_deferred("template", ns::HTML, Vec::new());
        adapter.insert_element(document, template, None).unwrap();
        let contents = adapter.get_template_content(template).unwrap();

        let item = adapter.create_element_deferred("x-item", ns::HTML, Vec::new());
        adapter.insert_element(contents, item, None).unwrap();

        assert!(log.borrow().is_empty());
        let tree = adapter.tree();
        assert_eq!(tree.element(item).unwrap().custom_element_state(), CustomElementState::Undefined);
        assert_ne!(tree.owner_document(item), document);
    }

    #[test]
    fn test_flush_deferred_sets_attributes() {
        let mut adapter = adapter();
        let div = adapter.create_element_deferred("div", ns::HTML, vec![ParserAttribute::new("class", "x")]);
        adapter.flush_deferred();
        assert_eq!(adapter.tree().get_attribute(div, "class"), Some("x"));
    }
}
