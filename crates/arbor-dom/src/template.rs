//! HTML Template Element
//!
//! Template content lives in a DocumentFragment owned by an inert document,
//! so it is never part of the active document and never upgraded there.

use crate::node::{DocumentData, NodeData};
use crate::{DomError, DomResult, DomTree, NodeId};

impl DomTree {
    /// The appropriate template contents owner document for `document`
    ///
    /// Created on first use and then reused; an inert owner is its own owner.
    pub(crate) fn template_contents_owner(&mut self, document: NodeId) -> NodeId {
        let Some(data) = self.node(document).as_document() else {
            return document;
        };
        if data.is_template_contents_owner {
            return document;
        }
        if let Some(owner) = data.template_contents_owner {
            return owner;
        }

        let kind = data.kind;
        let owner = self.alloc_document(DocumentData {
            kind,
            is_template_contents_owner: true,
            ..Default::default()
        });
        if let Some(data) = self.node_mut(document).as_document_mut() {
            data.template_contents_owner = Some(owner);
        }
        owner
    }

    /// Contents fragment of an HTML template element
    pub fn template_contents(&self, template: NodeId) -> Option<NodeId> {
        self.element(template)?.template_contents
    }

    /// Replace a template's contents with `fragment`
    ///
    /// The fragment moves into the template's contents owner document and
    /// becomes hosted by the template.
    pub fn set_template_contents(&mut self, template: NodeId, fragment: NodeId) -> DomResult<()> {
        if !self.element(template).is_some_and(|e| e.is_html_template()) {
            return Err(DomError::InvalidState("node is not a template element"));
        }
        if !matches!(self.expect_node(fragment)?.data, NodeData::DocumentFragment(_)) {
            return Err(DomError::InvalidState("template contents must be a document fragment"));
        }

        self.with_reactions(|tree| {
            let old = tree.template_contents(template);
            if let Some(old) = old.filter(|&old| old != fragment)
                && let NodeData::DocumentFragment(data) = &mut tree.node_mut(old).data
            {
                data.host = None;
            }

            let owner = tree.template_contents_owner(tree.owner_document(template));
            tree.adopt(fragment, owner);
            if let NodeData::DocumentFragment(data) = &mut tree.node_mut(fragment).data {
                data.host = Some(template);
            }
            if let Some(data) = tree.node_mut(template).as_element_mut() {
                data.template_contents = Some(fragment);
            }
        });
        Ok(())
    }
}
