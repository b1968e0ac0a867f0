//! DOM Node Operations
//!
//! Core node manipulation: appendChild, removeChild, insertBefore,
//! replaceChild, adoptNode, cloneNode.
//!
//! Each structural change adopts the moved subtree first, then queues custom
//! element reactions for it in tree order, then queues one mutation record.

use crate::custom_elements::LifecycleCallback;
use crate::node::{DocumentData, FragmentData, NodeData, NodeKind};
use crate::{DomError, DomResult, DomTree, NodeId};

impl DomTree {
    fn kind(&self, id: NodeId) -> NodeKind {
        self.node(id).kind()
    }

    /// Append a child node
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> DomResult<NodeId> {
        self.insert_before(parent, child, None)
    }

    /// Insert before a reference node, or append when `ref_child` is `None`
    pub fn insert_before(&mut self, parent: NodeId, new_child: NodeId, ref_child: Option<NodeId>) -> DomResult<NodeId> {
        self.expect_node(parent)?;
        self.expect_node(new_child)?;
        if let Some(ref_child) = ref_child {
            self.expect_node(ref_child)?;
        }
        self.with_reactions(|tree| tree.pre_insert(new_child, parent, ref_child))
    }

    /// Remove a child node
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> DomResult<NodeId> {
        self.expect_node(parent)?;
        self.with_reactions(|tree| {
            if tree.expect_node(child)?.parent != Some(parent) {
                return Err(DomError::NotFound("node is not a child of parent"));
            }
            tree.remove_node(child, false);
            Ok(child)
        })
    }

    /// Replace `old_child` with `new_child`, returns the replaced node
    pub fn replace_child(&mut self, parent: NodeId, new_child: NodeId, old_child: NodeId) -> DomResult<NodeId> {
        for id in [parent, new_child, old_child] {
            self.expect_node(id)?;
        }
        self.with_reactions(|tree| tree.replace(old_child, new_child, parent))
    }

    /// `ChildNode.remove`; a parentless or unknown node is left alone
    pub fn remove(&mut self, node: NodeId) {
        self.with_reactions(|tree| {
            if tree.get(node).is_some_and(|n| n.parent.is_some()) {
                tree.remove_node(node, false);
            }
        })
    }

    /// `Document.adoptNode`
    pub fn adopt_node(&mut self, document: NodeId, node: NodeId) -> DomResult<NodeId> {
        self.with_reactions(|tree| {
            tree.expect_document(document)?;
            match &tree.expect_node(node)?.data {
                NodeData::Document(_) => {
                    return Err(DomError::NotSupported("documents cannot be adopted".into()));
                }
                NodeData::DocumentFragment(fragment) if fragment.host.is_some() => return Ok(node),
                _ => {}
            }
            tree.adopt(node, document);
            Ok(node)
        })
    }

    /// Clone a node, with its descendants when `deep`
    ///
    /// Cloned custom elements are created without running their constructor;
    /// they get an upgrade reaction instead.
    pub fn clone_node(&mut self, node: NodeId, deep: bool) -> DomResult<NodeId> {
        self.with_reactions(|tree| {
            let document = tree.expect_node(node)?.owner_document;
            Ok(tree.clone_into(node, document, deep))
        })
    }

    fn clone_into(&mut self, node: NodeId, document: NodeId, deep: bool) -> NodeId {
        let (copy, document) = match &self.node(node).data {
            NodeData::Document(data) => {
                let copy = self.alloc_document(DocumentData {
                    kind: data.kind,
                    quirks_mode: data.quirks_mode,
                    ..Default::default()
                });
                (copy, copy)
            }
            NodeData::DocumentFragment(_) => {
                let copy = self.push_node(NodeData::DocumentFragment(FragmentData::default()), document);
                (copy, document)
            }
            NodeData::Doctype(data) => {
                let data = data.clone();
                (self.push_node(NodeData::Doctype(data), document), document)
            }
            NodeData::Text(s) => {
                let data = NodeData::Text(s.clone());
                (self.push_node(data, document), document)
            }
            NodeData::Comment(s) => {
                let data = NodeData::Comment(s.clone());
                (self.push_node(data, document), document)
            }
            NodeData::Element(element) => {
                let local_name = element.local_name.clone();
                let namespace = element.namespace.clone();
                let prefix = element.prefix.clone();
                let is = element.is_value.clone();
                let attrs: Vec<_> = element.attrs.iter().cloned().collect();

                let copy = self.create_an_element(
                    document,
                    &local_name,
                    namespace.as_deref(),
                    prefix.as_deref(),
                    is.as_deref(),
                    false,
                );
                for attr in attrs {
                    self.set_attribute_value(copy, &attr.local_name, &attr.value, attr.prefix, attr.namespace);
                }
                (copy, document)
            }
        };

        if deep {
            if let (Some(source), Some(target)) = (self.template_contents(node), self.template_contents(copy)) {
                let contents_document = self.owner_document(target);
                for child in self.children(source).to_vec() {
                    let child_copy = self.clone_into(child, contents_document, true);
                    self.insert(child_copy, target, None, false);
                }
            }
            for child in self.children(node).to_vec() {
                let child_copy = self.clone_into(child, document, true);
                self.insert(child_copy, copy, None, false);
            }
        }
        copy
    }

    /// Validate inserting `node` into `parent` before `child`
    ///
    /// With `replacing` set, `child` is the node being replaced and the
    /// document checks ignore it.
    fn ensure_validity(&self, node: NodeId, parent: NodeId, child: Option<NodeId>, replacing: bool) -> DomResult<()> {
        let parent_kind = self.kind(parent);
        if !matches!(
            parent_kind,
            NodeKind::Document | NodeKind::DocumentFragment | NodeKind::Element
        ) {
            return Err(DomError::HierarchyRequest("parent cannot have children"));
        }
        if self.is_host_including_inclusive_ancestor(node, parent) {
            return Err(DomError::HierarchyRequest("node is an inclusive ancestor of parent"));
        }
        if let Some(child) = child
            && self.node(child).parent != Some(parent)
        {
            return Err(DomError::NotFound("reference child is not a child of parent"));
        }

        let node_kind = self.kind(node);
        match node_kind {
            NodeKind::Document => return Err(DomError::HierarchyRequest("documents cannot be inserted")),
            NodeKind::Text if parent_kind == NodeKind::Document => {
                return Err(DomError::HierarchyRequest("text cannot be a child of a document"));
            }
            NodeKind::Doctype if parent_kind != NodeKind::Document => {
                return Err(DomError::HierarchyRequest("doctype must be a child of a document"));
            }
            _ => {}
        }
        if parent_kind != NodeKind::Document {
            return Ok(());
        }

        let siblings = &self.node(parent).children;
        let ignored = if replacing { child } else { None };
        let position = child.and_then(|c| siblings.iter().position(|&s| s == c));
        let is = |id: NodeId, kind: NodeKind| self.kind(id) == kind;

        let has_other_element = siblings
            .iter()
            .any(|&s| Some(s) != ignored && is(s, NodeKind::Element));
        let has_other_doctype = siblings
            .iter()
            .any(|&s| Some(s) != ignored && is(s, NodeKind::Doctype));
        let doctype_following = position.is_some_and(|p| siblings[p + 1..].iter().any(|&s| is(s, NodeKind::Doctype)));
        let element_preceding = position.is_some_and(|p| siblings[..p].iter().any(|&s| is(s, NodeKind::Element)));
        let child_is_doctype = !replacing && child.is_some_and(|c| is(c, NodeKind::Doctype));
        let element_misplaced = has_other_element || child_is_doctype || doctype_following;

        match node_kind {
            NodeKind::DocumentFragment => {
                let children = &self.node(node).children;
                let elements = children.iter().filter(|&&c| is(c, NodeKind::Element)).count();
                if elements > 1 || children.iter().any(|&c| is(c, NodeKind::Text)) {
                    return Err(DomError::HierarchyRequest("document can only have one element child"));
                }
                if elements == 1 && element_misplaced {
                    return Err(DomError::HierarchyRequest("document element misplaced"));
                }
            }
            NodeKind::Element if element_misplaced => {
                return Err(DomError::HierarchyRequest("document element misplaced"));
            }
            NodeKind::Doctype => {
                let element_before = if child.is_some() { element_preceding } else { has_other_element };
                if has_other_doctype || element_before {
                    return Err(DomError::HierarchyRequest("doctype misplaced"));
                }
            }
            _ => {}
        }
        Ok(())
    }

    pub(crate) fn pre_insert(&mut self, node: NodeId, parent: NodeId, child: Option<NodeId>) -> DomResult<NodeId> {
        self.ensure_validity(node, parent, child, false)?;
        let reference = match child {
            Some(c) if c == node => self.next_sibling(node),
            other => other,
        };
        self.insert(node, parent, reference, false);
        Ok(node)
    }

    /// Insert `node` (or a fragment's children) into `parent` before `child`
    pub(crate) fn insert(&mut self, node: NodeId, parent: NodeId, child: Option<NodeId>, suppress_observers: bool) {
        let is_fragment = self.kind(node) == NodeKind::DocumentFragment;
        let nodes: Vec<NodeId> = if is_fragment {
            self.children(node).to_vec()
        } else {
            vec![node]
        };
        if nodes.is_empty() {
            return;
        }

        if is_fragment {
            for &n in &nodes {
                self.remove_node(n, true);
            }
            self.queue_tree_mutation_record(node, Vec::new(), nodes.clone(), None, None);
        }

        let previous_sibling = match child {
            Some(c) => self.previous_sibling(c),
            None => self.last_child(parent),
        };
        let document = self.owner_document(parent);

        for &n in &nodes {
            self.adopt(n, document);

            let index = child
                .and_then(|c| self.index(c))
                .unwrap_or(self.node(parent).children.len());
            self.node_mut(parent).children.insert(index, n);
            self.node_mut(n).parent = Some(parent);
            tracing::trace!(node = ?n, ?parent, index, "inserted");

            if self.is_connected(parent) {
                let subtree: Vec<NodeId> = self.inclusive_descendants(n).collect();
                for descendant in subtree {
                    match self.element(descendant) {
                        Some(e) if e.is_custom() => {
                            self.enqueue_callback_reaction(descendant, LifecycleCallback::Connected);
                        }
                        Some(_) => self.try_upgrade(descendant),
                        None => {}
                    }
                }
            }
        }

        if !suppress_observers {
            self.queue_tree_mutation_record(parent, nodes, Vec::new(), previous_sibling, child);
        }
    }

    /// Detach `node` from its parent
    pub(crate) fn remove_node(&mut self, node: NodeId, suppress_observers: bool) {
        let Some(parent) = self.node(node).parent else {
            return;
        };
        let old_previous_sibling = self.previous_sibling(node);
        let old_next_sibling = self.next_sibling(node);
        let was_connected = self.is_connected(parent);

        self.node_mut(parent).children.retain(|&c| c != node);
        self.node_mut(node).parent = None;
        tracing::trace!(?node, ?parent, "removed");

        if was_connected {
            let subtree: Vec<NodeId> = self.inclusive_descendants(node).collect();
            for descendant in subtree {
                if self.element(descendant).is_some_and(|e| e.is_custom()) {
                    self.enqueue_callback_reaction(descendant, LifecycleCallback::Disconnected);
                }
            }
        }

        self.add_transient_registrations(node, parent);

        if !suppress_observers {
            self.queue_tree_mutation_record(parent, Vec::new(), vec![node], old_previous_sibling, old_next_sibling);
        }
    }

    fn replace(&mut self, child: NodeId, node: NodeId, parent: NodeId) -> DomResult<NodeId> {
        self.ensure_validity(node, parent, Some(child), true)?;

        let mut reference = self.next_sibling(child);
        if reference == Some(node) {
            reference = self.next_sibling(node);
        }
        let mut previous_sibling = self.previous_sibling(child);
        if previous_sibling == Some(node) {
            previous_sibling = self.previous_sibling(node);
        }

        let document = self.owner_document(parent);
        self.adopt(node, document);

        let mut removed_nodes = Vec::new();
        if self.node(child).parent.is_some() {
            removed_nodes.push(child);
            self.remove_node(child, true);
        }

        let nodes = if self.kind(node) == NodeKind::DocumentFragment {
            self.children(node).to_vec()
        } else {
            vec![node]
        };
        self.insert(node, parent, reference, true);
        self.queue_tree_mutation_record(parent, nodes, removed_nodes, previous_sibling, reference);
        Ok(child)
    }

    /// Move `node` and its subtree into `document`
    pub(crate) fn adopt(&mut self, node: NodeId, document: NodeId) {
        let old_document = self.owner_document(node);
        if self.node(node).parent.is_some() {
            self.remove_node(node, false);
        }
        if old_document == document {
            return;
        }

        let subtree: Vec<NodeId> = self.inclusive_descendants(node).collect();
        for &n in &subtree {
            self.node_mut(n).owner_document = document;
        }
        tracing::trace!(?node, ?old_document, ?document, "adopted");

        for &n in &subtree {
            if self.element(n).is_some_and(|e| e.is_custom()) {
                self.enqueue_callback_reaction(
                    n,
                    LifecycleCallback::Adopted {
                        old_document,
                        new_document: document,
                    },
                );
            }
        }

        for n in subtree {
            if let Some(contents) = self.template_contents(n) {
                let owner = self.template_contents_owner(document);
                self.adopt(contents, owner);
            }
        }
    }
}
