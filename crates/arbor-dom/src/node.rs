//! DOM Node
//!
//! A node is its parent link, its ordered children and its kind-specific data.
//! Siblings are not stored: they are derived from the position in the parent's
//! children, so there is no sibling pointer to go stale.

use std::borrow::Cow;
use std::rc::Rc;

use crate::attributes::AttributeList;
use crate::custom_elements::CustomElementDefinition;
use crate::observer::RegisteredObserver;
use crate::{NodeId, ns};

/// DOM Node - Core structure
#[derive(Debug)]
pub struct Node {
    /// Parent node (`None` for roots and detached nodes)
    pub(crate) parent: Option<NodeId>,
    /// Children in document order
    pub(crate) children: Vec<NodeId>,
    /// Node document, kept in sync by adoption
    pub(crate) owner_document: NodeId,
    /// Registered observers, including transient ones
    pub(crate) registered_observers: Vec<RegisteredObserver>,
    /// Node-specific data
    pub(crate) data: NodeData,
}

impl Node {
    pub(crate) fn new(data: NodeData, owner_document: NodeId) -> Self {
        Self {
            parent: None,
            children: Vec::new(),
            owner_document,
            registered_observers: Vec::new(),
            data,
        }
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn owner_document(&self) -> NodeId {
        self.owner_document
    }

    pub fn data(&self) -> &NodeData {
        &self.data
    }

    #[inline]
    pub fn kind(&self) -> NodeKind {
        self.data.kind()
    }

    #[inline]
    pub fn is_element(&self) -> bool {
        matches!(self.data, NodeData::Element(_))
    }

    #[inline]
    pub fn is_text(&self) -> bool {
        matches!(self.data, NodeData::Text(_))
    }

    #[inline]
    pub fn as_element(&self) -> Option<&ElementData> {
        match &self.data {
            NodeData::Element(e) => Some(e),
            _ => None,
        }
    }

    #[inline]
    pub(crate) fn as_element_mut(&mut self) -> Option<&mut ElementData> {
        match &mut self.data {
            NodeData::Element(e) => Some(e),
            _ => None,
        }
    }

    #[inline]
    pub fn as_document(&self) -> Option<&DocumentData> {
        match &self.data {
            NodeData::Document(d) => Some(d),
            _ => None,
        }
    }

    #[inline]
    pub(crate) fn as_document_mut(&mut self) -> Option<&mut DocumentData> {
        match &mut self.data {
            NodeData::Document(d) => Some(d),
            _ => None,
        }
    }

    /// Text or comment data
    #[inline]
    pub fn character_data(&self) -> Option<&str> {
        match &self.data {
            NodeData::Text(s) | NodeData::Comment(s) => Some(s),
            _ => None,
        }
    }
}

/// Node-specific data
#[derive(Debug)]
pub enum NodeData {
    Document(DocumentData),
    DocumentFragment(FragmentData),
    Doctype(DoctypeData),
    Element(ElementData),
    Text(String),
    Comment(String),
}

impl NodeData {
    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Document(_) => NodeKind::Document,
            Self::DocumentFragment(_) => NodeKind::DocumentFragment,
            Self::Doctype(_) => NodeKind::Doctype,
            Self::Element(_) => NodeKind::Element,
            Self::Text(_) => NodeKind::Text,
            Self::Comment(_) => NodeKind::Comment,
        }
    }
}

/// Node kind discriminant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Document,
    DocumentFragment,
    Doctype,
    Element,
    Text,
    Comment,
}

impl NodeKind {
    /// `Node.nodeType` value
    pub fn node_type(self) -> u16 {
        match self {
            Self::Element => 1,
            Self::Text => 3,
            Self::Comment => 8,
            Self::Document => 9,
            Self::Doctype => 10,
            Self::DocumentFragment => 11,
        }
    }
}

/// Document flavour, decides name case-folding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DocumentKind {
    #[default]
    Html,
    Xml,
}

/// Document compatibility mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QuirksMode {
    #[default]
    NoQuirks,
    Quirks,
    LimitedQuirks,
}

/// Document-specific data
#[derive(Debug, Clone, Default)]
pub struct DocumentData {
    pub(crate) kind: DocumentKind,
    pub(crate) quirks_mode: QuirksMode,
    /// Only documents with a browsing context look up custom element definitions
    pub(crate) has_browsing_context: bool,
    /// Inert document owning template contents created from this document
    pub(crate) template_contents_owner: Option<NodeId>,
    pub(crate) is_template_contents_owner: bool,
    pub(crate) throw_on_dynamic_markup_insertion: u32,
}

impl DocumentData {
    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    pub fn is_html(&self) -> bool {
        self.kind == DocumentKind::Html
    }

    pub fn quirks_mode(&self) -> QuirksMode {
        self.quirks_mode
    }

    pub fn has_browsing_context(&self) -> bool {
        self.has_browsing_context
    }

    pub fn is_template_contents_owner(&self) -> bool {
        self.is_template_contents_owner
    }

    /// Non-zero while the parser runs a custom element constructor
    pub fn throw_on_dynamic_markup_insertion(&self) -> u32 {
        self.throw_on_dynamic_markup_insertion
    }
}

/// DocumentFragment data
#[derive(Debug, Clone, Copy, Default)]
pub struct FragmentData {
    /// Template element whose contents this fragment is
    pub(crate) host: Option<NodeId>,
}

impl FragmentData {
    pub fn host(&self) -> Option<NodeId> {
        self.host
    }
}

/// DOCTYPE data
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DoctypeData {
    pub name: String,
    pub public_id: String,
    pub system_id: String,
}

/// Custom element state of an element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CustomElementState {
    /// Potential custom element waiting for a definition
    Undefined,
    /// Construction or upgrade threw
    Failed,
    /// Ordinary element
    #[default]
    Uncustomized,
    /// Being constructed synchronously
    Precustomized,
    /// Successfully constructed or upgraded
    Custom,
}

/// Element-specific data
#[derive(Debug)]
pub struct ElementData {
    pub(crate) namespace: Option<String>,
    pub(crate) prefix: Option<String>,
    pub(crate) local_name: String,
    pub(crate) attrs: AttributeList,
    pub(crate) is_value: Option<String>,
    pub(crate) state: CustomElementState,
    pub(crate) definition: Option<Rc<CustomElementDefinition>>,
    /// Contents fragment, allocated eagerly for HTML `template` elements
    pub(crate) template_contents: Option<NodeId>,
}

impl ElementData {
    pub(crate) fn new(local_name: String, namespace: Option<String>, prefix: Option<String>) -> Self {
        Self {
            namespace,
            prefix,
            local_name,
            attrs: AttributeList::new(),
            is_value: None,
            state: CustomElementState::Uncustomized,
            definition: None,
            template_contents: None,
        }
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    pub fn local_name(&self) -> &str {
        &self.local_name
    }

    /// `prefix:localName`, or the local name alone
    pub fn qualified_name(&self) -> Cow<'_, str> {
        match &self.prefix {
            Some(prefix) => Cow::Owned(format!("{}:{}", prefix, self.local_name)),
            None => Cow::Borrowed(&self.local_name),
        }
    }

    pub fn attributes(&self) -> &AttributeList {
        &self.attrs
    }

    pub fn is_value(&self) -> Option<&str> {
        self.is_value.as_deref()
    }

    pub fn custom_element_state(&self) -> CustomElementState {
        self.state
    }

    pub fn definition(&self) -> Option<&Rc<CustomElementDefinition>> {
        self.definition.as_ref()
    }

    /// Custom element state is "custom"
    pub fn is_custom(&self) -> bool {
        self.state == CustomElementState::Custom
    }

    /// Matches `:defined`
    pub fn is_defined(&self) -> bool {
        matches!(self.state, CustomElementState::Uncustomized | CustomElementState::Custom)
    }

    pub fn is_html(&self) -> bool {
        self.namespace.as_deref() == Some(ns::HTML)
    }

    pub fn is_html_template(&self) -> bool {
        self.is_html() && self.local_name == "template"
    }

    pub fn template_contents(&self) -> Option<NodeId> {
        self.template_contents
    }
}
