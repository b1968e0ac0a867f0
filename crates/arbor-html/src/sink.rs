//! html5ever TreeSink bridge
//!
//! Forwards html5ever's tree-construction callbacks to a [`ParserAdapter`].
//! html5ever creates an element before it picks the insertion point and
//! closes some elements without calling `pop`, so elements are created
//! deferred and finished against the parent they are first inserted into.

use std::borrow::Cow;
use std::cell::{Ref, RefCell, RefMut};

use arbor_dom::{DomResult, NodeId, QuirksMode};
use html5ever::tendril::StrTendril;
use html5ever::tree_builder::{ElementFlags, NodeOrText, QuirksMode as HtmlQuirksMode, TreeSink};
use html5ever::{Attribute, ExpandedName, LocalName, Namespace, QualName};

use crate::{ParseError, ParseOutput};
use crate::adapter::{ParserAdapter, ParserAttribute};

/// Node handle passed back to html5ever
///
/// Non-element nodes carry an empty name.
#[derive(Debug, Clone)]
pub struct SinkHandle {
    id: NodeId,
    name: QualName,
    annotation_xml_integration_point: bool,
}

impl SinkHandle {
    fn node(id: NodeId) -> Self {
        Self {
            id,
            name: QualName::new(None, Namespace::from(""), LocalName::from("")),
            annotation_xml_integration_point: false,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }
}

/// html5ever sink writing into an Arbor DOM tree
#[derive(Debug)]
pub struct HtmlSink {
    adapter: RefCell<ParserAdapter>,
    errors: RefCell<Vec<ParseError>>,
}

impl HtmlSink {
    pub fn new(adapter: ParserAdapter) -> Self {
        Self {
            adapter: RefCell::new(adapter),
            errors: RefCell::new(Vec::new()),
        }
    }

    pub fn adapter(&self) -> Ref<'_, ParserAdapter> {
        self.adapter.borrow()
    }

    pub fn adapter_mut(&self) -> RefMut<'_, ParserAdapter> {
        self.adapter.borrow_mut()
    }

    fn check(&self, result: DomResult<()>) {
        if let Err(err) = result {
            tracing::warn!("Tree construction failed: {}", err);
            self.errors.borrow_mut().push(ParseError::Tree(err));
        }
    }
}

fn convert_attributes(attrs: Vec<Attribute>) -> Vec<ParserAttribute> {
    attrs
        .into_iter()
        .map(|attr| ParserAttribute {
            name: attr.name.local.to_string(),
            value: attr.value.to_string(),
            prefix: attr.name.prefix.map(|p| p.to_string()),
            namespace: (!attr.name.ns.is_empty()).then(|| attr.name.ns.to_string()),
        })
        .collect()
}

impl TreeSink for HtmlSink {
    type Handle = SinkHandle;
    type Output = ParseOutput;
    type ElemName<'a>
        = ExpandedName<'a>
    where
        Self: 'a;

    fn finish(self) -> Self::Output {
        let mut adapter = self.adapter.into_inner();
        adapter.flush_deferred();
        adapter.tree_mut().perform_microtask_checkpoint();
        let document = adapter.create_document();
        ParseOutput {
            tree: adapter.into_tree(),
            document,
            errors: self.errors.into_inner(),
        }
    }

    fn parse_error(&self, msg: Cow<'static, str>) {
        tracing::debug!("Parse error: {}", msg);
        self.errors.borrow_mut().push(ParseError::Syntax(msg.into_owned()));
    }

    fn get_document(&self) -> Self::Handle {
        SinkHandle::node(self.adapter().create_document())
    }

    fn elem_name<'a>(&'a self, target: &'a Self::Handle) -> ExpandedName<'a> {
        target.name.expanded()
    }

    fn create_element(&self, name: QualName, attrs: Vec<Attribute>, flags: ElementFlags) -> Self::Handle {
        let id = self
            .adapter_mut()
            .create_element_deferred(&name.local, &name.ns, convert_attributes(attrs));
        SinkHandle {
            id,
            name,
            annotation_xml_integration_point: flags.mathml_annotation_xml_integration_point,
        }
    }

    fn create_comment(&self, text: StrTendril) -> Self::Handle {
        SinkHandle::node(self.adapter_mut().create_comment_node(&text))
    }

    fn create_pi(&self, _target: StrTendril, data: StrTendril) -> Self::Handle {
        // HTML has no processing instructions; the tokenizer reports them as bogus comments
        SinkHandle::node(self.adapter_mut().create_comment_node(&data))
    }

    fn append(&self, parent: &Self::Handle, child: NodeOrText<Self::Handle>) {
        match child {
            NodeOrText::AppendNode(node) => {
                let result = self.adapter_mut().insert_element(parent.id, node.id, None);
                self.check(result);
            }
            NodeOrText::AppendText(text) => {
                let result = self.adapter_mut().insert_text(parent.id, &text);
                self.check(result);
            }
        }
    }

    fn append_based_on_parent_node(
        &self,
        element: &Self::Handle,
        prev_element: &Self::Handle,
        child: NodeOrText<Self::Handle>,
    ) {
        let has_parent = self.adapter().tree().parent(element.id).is_some();
        if has_parent {
            self.append_before_sibling(element, child);
        } else {
            self.append(prev_element, child);
        }
    }

    fn append_doctype_to_document(&self, name: StrTendril, public_id: StrTendril, system_id: StrTendril) {
        let mut adapter = self.adapter_mut();
        let document = adapter.create_document();
        let result = adapter.set_document_type(document, &name, &public_id, &system_id);
        drop(adapter);
        self.check(result);
    }

    fn get_template_contents(&self, target: &Self::Handle) -> Self::Handle {
        let contents = self.adapter().get_template_content(target.id);
        match contents {
            Ok(contents) => SinkHandle::node(contents),
            Err(err) => {
                tracing::warn!("Template contents requested for non-template: {}", err);
                target.clone()
            }
        }
    }

    fn same_node(&self, x: &Self::Handle, y: &Self::Handle) -> bool {
        x.id == y.id
    }

    fn set_quirks_mode(&self, mode: HtmlQuirksMode) {
        let mode = match mode {
            HtmlQuirksMode::Quirks => QuirksMode::Quirks,
            HtmlQuirksMode::LimitedQuirks => QuirksMode::LimitedQuirks,
            HtmlQuirksMode::NoQuirks => QuirksMode::NoQuirks,
        };
        let mut adapter = self.adapter_mut();
        let document = adapter.create_document();
        adapter.set_document_mode(document, mode);
    }

    fn append_before_sibling(&self, sibling: &Self::Handle, new_node: NodeOrText<Self::Handle>) {
        let Some(parent) = self.adapter().tree().parent(sibling.id) else {
            return;
        };
        let result = match new_node {
            NodeOrText::AppendNode(node) => self.adapter_mut().insert_element(parent, node.id, Some(sibling.id)),
            NodeOrText::AppendText(text) => self.adapter_mut().insert_text_before(parent, &text, sibling.id),
        };
        self.check(result);
    }

    fn add_attrs_if_missing(&self, target: &Self::Handle, attrs: Vec<Attribute>) {
        self.adapter_mut().adopt_attributes(target.id, convert_attributes(attrs));
    }

    fn remove_from_parent(&self, target: &Self::Handle) {
        self.adapter_mut().detach_node(target.id);
    }

    fn reparent_children(&self, node: &Self::Handle, new_parent: &Self::Handle) {
        let children = self.adapter().tree().children(node.id).to_vec();
        for child in children {
            let result = self.adapter_mut().append_child(new_parent.id, child);
            self.check(result);
        }
    }

    fn is_mathml_annotation_xml_integration_point(&self, handle: &Self::Handle) -> bool {
        handle.annotation_xml_integration_point
    }
}
