//! Document - node factories and document-level state

use crate::attributes::{is_valid_name, validate_and_extract};
use crate::node::{DoctypeData, DocumentData, DocumentKind, FragmentData, NodeData, QuirksMode};
use crate::{DomError, DomResult, DomTree, ElementOptions, NodeId, ns};

impl DomTree {
    /// Create a document with a browsing context
    ///
    /// Custom element definitions apply to elements created in it.
    pub fn create_document(&mut self, kind: DocumentKind) -> NodeId {
        self.alloc_document(DocumentData {
            kind,
            has_browsing_context: true,
            ..Default::default()
        })
    }

    /// Create a document without a browsing context (`createHTMLDocument` style)
    pub fn create_inert_document(&mut self, kind: DocumentKind) -> NodeId {
        self.alloc_document(DocumentData {
            kind,
            ..Default::default()
        })
    }

    pub(crate) fn alloc_document(&mut self, data: DocumentData) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        let document = self.push_node(NodeData::Document(data), id);
        tracing::debug!(?document, "Created document");
        document
    }

    pub(crate) fn expect_document(&self, id: NodeId) -> DomResult<&DocumentData> {
        self.get(id)
            .and_then(|n| n.as_document())
            .ok_or(DomError::InvalidState("node is not a document"))
    }

    pub fn is_html_document(&self, id: NodeId) -> bool {
        self.node(id).as_document().is_some_and(|d| d.is_html())
    }

    /// First element child of a document
    pub fn document_element(&self, document: NodeId) -> Option<NodeId> {
        self.children(document)
            .iter()
            .copied()
            .find(|&c| self.node(c).is_element())
    }

    pub fn doctype(&self, document: NodeId) -> Option<NodeId> {
        self.children(document)
            .iter()
            .copied()
            .find(|&c| matches!(self.node(c).data, NodeData::Doctype(_)))
    }

    pub fn quirks_mode(&self, document: NodeId) -> QuirksMode {
        self.node(document)
            .as_document()
            .map(|d| d.quirks_mode())
            .unwrap_or_default()
    }

    pub fn set_quirks_mode(&mut self, document: NodeId, mode: QuirksMode) {
        if let Some(data) = self.node_mut(document).as_document_mut() {
            data.quirks_mode = mode;
        }
    }

    /// Adjust the throw-on-dynamic-markup-insertion counter
    pub fn increment_throw_on_dynamic_markup_insertion(&mut self, document: NodeId) {
        if let Some(data) = self.node_mut(document).as_document_mut() {
            data.throw_on_dynamic_markup_insertion += 1;
        }
    }

    pub fn decrement_throw_on_dynamic_markup_insertion(&mut self, document: NodeId) {
        if let Some(data) = self.node_mut(document).as_document_mut() {
            data.throw_on_dynamic_markup_insertion = data.throw_on_dynamic_markup_insertion.saturating_sub(1);
        }
    }

    /// `Document.createElement`; defined custom elements are constructed synchronously
    pub fn create_element(&mut self, document: NodeId, local_name: &str, options: ElementOptions) -> DomResult<NodeId> {
        self.with_reactions(|tree| {
            let is_html = tree.expect_document(document)?.is_html();
            if !is_valid_name(local_name) {
                return Err(DomError::Syntax(local_name.to_string()));
            }
            let local_name = if is_html {
                local_name.to_ascii_lowercase()
            } else {
                local_name.to_string()
            };
            let namespace = is_html.then_some(ns::HTML);
            Ok(tree.create_an_element(document, &local_name, namespace, None, options.is.as_deref(), true))
        })
    }

    /// `Document.createElementNS`
    pub fn create_element_ns(
        &mut self,
        document: NodeId,
        namespace: Option<&str>,
        qualified_name: &str,
        options: ElementOptions,
    ) -> DomResult<NodeId> {
        self.with_reactions(|tree| {
            tree.expect_document(document)?;
            let (namespace, prefix, local_name) = validate_and_extract(namespace, qualified_name)?;
            Ok(tree.create_an_element(
                document,
                &local_name,
                namespace.as_deref(),
                prefix.as_deref(),
                options.is.as_deref(),
                true,
            ))
        })
    }

    /// Create an element for a tree builder token
    ///
    /// Names are taken as given. With `synchronous` set, a matching custom
    /// element constructor runs before this returns; otherwise the element
    /// is queued for upgrade.
    pub fn create_element_for_token(
        &mut self,
        document: NodeId,
        local_name: &str,
        namespace: Option<&str>,
        is: Option<&str>,
        synchronous: bool,
    ) -> NodeId {
        self.create_an_element(document, local_name, namespace, None, is, synchronous)
    }

    /// Create an element for a token whose insertion point is not known yet
    ///
    /// No definition is consulted. Call [`DomTree::construct_for_token`]
    /// once the document of the element's parent is known.
    pub fn create_unconstructed_element(
        &mut self,
        document: NodeId,
        local_name: &str,
        namespace: Option<&str>,
        is: Option<&str>,
    ) -> NodeId {
        self.create_unresolved_element(document, local_name, namespace, is)
    }

    pub fn create_document_fragment(&mut self, document: NodeId) -> NodeId {
        self.push_node(NodeData::DocumentFragment(FragmentData::default()), document)
    }

    pub fn create_text_node(&mut self, document: NodeId, data: &str) -> NodeId {
        self.push_node(NodeData::Text(data.to_string()), document)
    }

    pub fn create_comment(&mut self, document: NodeId, data: &str) -> NodeId {
        self.push_node(NodeData::Comment(data.to_string()), document)
    }

    pub fn create_doctype(&mut self, document: NodeId, name: &str, public_id: &str, system_id: &str) -> NodeId {
        self.push_node(
            NodeData::Doctype(DoctypeData {
                name: name.to_string(),
                public_id: public_id.to_string(),
                system_id: system_id.to_string(),
            }),
            document,
        )
    }

    /// Overwrite the fields of an existing doctype node
    pub fn set_doctype_data(&mut self, doctype: NodeId, name: &str, public_id: &str, system_id: &str) {
        if let NodeData::Doctype(data) = &mut self.node_mut(doctype).data {
            data.name = name.to_string();
            data.public_id = public_id.to_string();
            data.system_id = system_id.to_string();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CustomElementState, NodeKind};

    #[test]
    fn test_document_is_its_own_owner() {
        let mut tree = DomTree::new();
        let doc = tree.create_document(DocumentKind::Html);

        assert_eq!(tree.owner_document(doc), doc);
        assert!(tree.is_connected(doc));
        assert!(tree.node(doc).as_document().unwrap().has_browsing_context());
        assert_eq!(tree.node(doc).kind(), NodeKind::Document);
    }

    #[test]
    fn test_create_element_lowercases_in_html() {
        let mut tree = DomTree::new();
        let doc = tree.create_document(DocumentKind::Html);
        let div = tree.create_element(doc, "DIV", ElementOptions::default()).unwrap();

        let data = tree.element(div).unwrap();
        assert_eq!(data.local_name(), "div");
        assert_eq!(data.namespace(), Some(ns::HTML));
        assert_eq!(data.custom_element_state(), CustomElementState::Uncustomized);

        let xml = tree.create_document(DocumentKind::Xml);
        let item = tree.create_element(xml, "Item", ElementOptions::default()).unwrap();
        assert_eq!(tree.element(item).unwrap().local_name(), "Item");
        assert_eq!(tree.element(item).unwrap().namespace(), None);
    }

    #[test]
    fn test_create_element_rejects_bad_names() {
        let mut tree = DomTree::new();
        let doc = tree.create_document(DocumentKind::Html);

        assert!(matches!(
            tree.create_element(doc, "1div", ElementOptions::default()),
            Err(DomError::Syntax(_))
        ));
        assert!(matches!(
            tree.create_element_ns(doc, None, "svg:rect", ElementOptions::default()),
            Err(DomError::Namespace(_))
        ));
    }

    #[test]
    fn test_undefined_state_for_potential_custom_elements() {
        let mut tree = DomTree::new();
        let doc = tree.create_document(DocumentKind::Html);
        let el = tree.create_element(doc, "x-later", ElementOptions::default()).unwrap();
        assert_eq!(tree.element(el).unwrap().custom_element_state(), CustomElementState::Undefined);

        let svg = tree.create_element_ns(doc, Some(ns::SVG), "x-later", ElementOptions::default()).unwrap();
        assert_eq!(tree.element(svg).unwrap().custom_element_state(), CustomElementState::Uncustomized);
    }

    #[test]
    fn test_document_element_and_doctype() {
        let mut tree = DomTree::new();
        let doc = tree.create_document(DocumentKind::Html);
        let doctype = tree.create_doctype(doc, "html", "", "");
        let html = tree.create_element(doc, "html", ElementOptions::default()).unwrap();
        tree.append_child(doc, doctype).unwrap();
        tree.append_child(doc, html).unwrap();

        assert_eq!(tree.doctype(doc), Some(doctype));
        assert_eq!(tree.document_element(doc), Some(html));
    }
}
