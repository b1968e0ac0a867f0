//! DOM Tree (arena-based allocation)

use std::fmt;
use std::rc::Rc;

use crate::custom_elements::CustomElementRegistry;
use crate::microtask::MicrotaskQueue;
use crate::node::{ElementData, Node, NodeData};
use crate::observer::MutationObservers;
use crate::reactions::ReactionStack;
use crate::{DomConfig, DomError, DomResult, ErrorReporter, NodeId, ScriptError, TracingErrorReporter};

/// Options for [`DomTree::create_element`]
#[derive(Debug, Clone, Default)]
pub struct ElementOptions {
    /// Customized built-in name (`is` attribute)
    pub is: Option<String>,
}

/// Arena owning every node of every document created through it
///
/// Nodes are never freed while the tree lives, so ids handed to observers and
/// callbacks stay valid after removal.
pub struct DomTree {
    pub(crate) nodes: Vec<Node>,
    pub(crate) config: DomConfig,
    pub(crate) registry: CustomElementRegistry,
    pub(crate) reactions: ReactionStack,
    pub(crate) observers: MutationObservers,
    pub(crate) microtasks: MicrotaskQueue,
    reporter: Rc<dyn ErrorReporter>,
}

impl fmt::Debug for DomTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DomTree")
            .field("nodes", &self.nodes.len())
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("reactions", &self.reactions)
            .field("observers", &self.observers)
            .field("microtasks", &self.microtasks)
            .finish_non_exhaustive()
    }
}

impl Default for DomTree {
    fn default() -> Self {
        Self::new()
    }
}

impl DomTree {
    /// Create a new empty DOM tree
    pub fn new() -> Self {
        Self::with_config(DomConfig::default())
    }

    pub fn with_config(config: DomConfig) -> Self {
        Self {
            nodes: Vec::new(),
            config,
            registry: CustomElementRegistry::default(),
            reactions: ReactionStack::default(),
            observers: MutationObservers::default(),
            microtasks: MicrotaskQueue::default(),
            reporter: Rc::new(TracingErrorReporter),
        }
    }

    pub fn config(&self) -> &DomConfig {
        &self.config
    }

    /// Replace where isolated callback failures go
    pub fn set_error_reporter(&mut self, reporter: impl ErrorReporter + 'static) {
        self.reporter = Rc::new(reporter);
    }

    pub(crate) fn report_error(&self, error: &ScriptError) {
        self.reporter.report(error);
    }

    pub(crate) fn push_node(&mut self, data: NodeData, owner_document: NodeId) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node::new(data, owner_document));
        id
    }

    /// Get a node by ID
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    /// Get a node by ID
    ///
    /// Panics if `id` was not allocated by this tree.
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    /// Like [`DomTree::get`], failing for ids from another tree
    pub(crate) fn expect_node(&self, id: NodeId) -> DomResult<&Node> {
        self.get(id).ok_or(DomError::NotFound("node does not belong to this tree"))
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    /// Number of nodes in the tree
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if tree is empty
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub(crate) fn node_ids(&self) -> impl Iterator<Item = NodeId> + use<> {
        (0..self.nodes.len() as u32).map(NodeId)
    }

    pub fn element(&self, id: NodeId) -> Option<&ElementData> {
        self.get(id)?.as_element()
    }

    pub(crate) fn expect_element(&self, id: NodeId) -> DomResult<&ElementData> {
        self.element(id).ok_or(DomError::InvalidState("node is not an element"))
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).children.first().copied()
    }

    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).children.last().copied()
    }

    /// Position of `id` among its parent's children
    pub fn index(&self, id: NodeId) -> Option<usize> {
        let parent = self.node(id).parent?;
        self.node(parent).children.iter().position(|&c| c == id)
    }

    pub fn previous_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.node(id).parent?;
        let index = self.index(id)?;
        index.checked_sub(1).map(|i| self.node(parent).children[i])
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.node(id).parent?;
        let index = self.index(id)?;
        self.node(parent).children.get(index + 1).copied()
    }

    pub fn owner_document(&self, id: NodeId) -> NodeId {
        self.node(id).owner_document
    }

    /// Topmost inclusive ancestor
    pub fn root(&self, id: NodeId) -> NodeId {
        self.inclusive_ancestors(id).last().unwrap_or(id)
    }

    /// Root is a document
    pub fn is_connected(&self, id: NodeId) -> bool {
        self.node(self.root(id)).as_document().is_some()
    }

    /// `id` followed by its ancestors, nearest first
    pub fn inclusive_ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(Some(id), move |&n| self.node(n).parent)
    }

    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.inclusive_ancestors(id).skip(1)
    }

    pub fn is_inclusive_ancestor(&self, ancestor: NodeId, id: NodeId) -> bool {
        self.inclusive_ancestors(id).any(|n| n == ancestor)
    }

    /// Inclusive ancestor, crossing from template contents to their template
    pub(crate) fn is_host_including_inclusive_ancestor(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node) = current {
            if self.is_inclusive_ancestor(ancestor, node) {
                return true;
            }
            let root = self.root(node);
            current = match &self.node(root).data {
                NodeData::DocumentFragment(fragment) => fragment.host,
                _ => None,
            };
        }
        false
    }

    /// Pre-order traversal of `id` and its descendants
    pub fn inclusive_descendants(&self, id: NodeId) -> Descendants<'_> {
        Descendants {
            tree: self,
            stack: vec![id],
        }
    }

    /// Pre-order traversal of the descendants of `id`
    pub fn descendants(&self, id: NodeId) -> Descendants<'_> {
        let mut iter = self.inclusive_descendants(id);
        iter.next();
        iter
    }

    /// Concatenated data of descendant text nodes
    pub fn text_content(&self, id: NodeId) -> String {
        match &self.node(id).data {
            NodeData::Text(s) | NodeData::Comment(s) => s.clone(),
            NodeData::Document(_) | NodeData::Doctype(_) => String::new(),
            _ => self
                .descendants(id)
                .filter_map(|n| match &self.node(n).data {
                    NodeData::Text(s) => Some(s.as_str()),
                    _ => None,
                })
                .collect(),
        }
    }
}

/// Tree-order iterator
pub struct Descendants<'a> {
    tree: &'a DomTree,
    stack: Vec<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.stack.pop()?;
        self.stack.extend(self.tree.node(id).children.iter().rev());
        Some(id)
    }
}
