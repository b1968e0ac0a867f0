//! Arbor DOM - Document Object Model core
//!
//! Arena-based node tree with the machinery that keeps custom element
//! reactions and mutation observers informed while the tree changes.
//!
//! All mutation entry points live on [`DomTree`]. Public mutators run inside a
//! custom element reaction scope, so lifecycle callbacks for the affected
//! elements have run by the time the call returns. Mutation records are
//! delivered later, at [`DomTree::perform_microtask_checkpoint`].

mod attributes;
mod character_data;
mod config;
mod custom_elements;
mod document;
mod error;
mod microtask;
mod node;
mod observer;
mod operations;
mod reactions;
mod template;
mod tree;

pub use attributes::{Attribute, AttributeList};
pub use config::DomConfig;
pub use custom_elements::{
    CallbackKind, CustomElementConstructor, CustomElementDefinition, CustomElementRegistry,
    DefinitionOptions, LifecycleCallback, is_valid_custom_element_name,
};
pub use error::{DomError, DomResult, ErrorReporter, ScriptError, TracingErrorReporter};
pub use node::{
    CustomElementState, DoctypeData, DocumentData, DocumentKind, ElementData, FragmentData, Node,
    NodeData, NodeKind, QuirksMode,
};
pub use observer::{
    MutationCallback, MutationObserverInit, MutationRecord, MutationType, ObserverId,
};
pub use reactions::{Reaction, ReactionQueue};
pub use tree::{Descendants, DomTree, ElementOptions};

/// Node identifier (index into the tree's arena)
///
/// Ids are never reused, so a `NodeId` held by a mutation record or a
/// callback stays valid after the node is detached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Well-known namespace URLs
pub mod ns {
    pub const HTML: &str = "http://www.w3.org/1999/xhtml";
    pub const SVG: &str = "http://www.w3.org/2000/svg";
    pub const MATHML: &str = "http://www.w3.org/1998/Math/MathML";
    pub const XLINK: &str = "http://www.w3.org/1999/xlink";
    pub const XML: &str = "http://www.w3.org/XML/1998/namespace";
    pub const XMLNS: &str = "http://www.w3.org/2000/xmlns/";
}
