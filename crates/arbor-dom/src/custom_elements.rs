//! Custom Elements
//!
//! Custom element registry, the create-an-element algorithm and upgrades.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;

use crate::node::{CustomElementState, ElementData, FragmentData, NodeData};
use crate::reactions::Reaction;
use crate::{DomError, DomResult, DomTree, NodeId, ScriptError, ns};

/// Names that match the custom element production but are reserved by SVG and MathML
const RESERVED_NAMES: &[&str] = &[
    "annotation-xml",
    "color-profile",
    "font-face",
    "font-face-src",
    "font-face-uri",
    "font-face-format",
    "font-face-name",
    "missing-glyph",
];

/// Elements that `extends` may name (anything else is HTMLUnknownElement)
const KNOWN_HTML_ELEMENTS: &[&str] = &[
    "a", "abbr", "address", "area", "article", "aside", "audio", "b", "base", "bdi", "bdo",
    "blockquote", "body", "br", "button", "canvas", "caption", "cite", "code", "col",
    "colgroup", "data", "datalist", "dd", "del", "details", "dfn", "dialog", "div", "dl", "dt",
    "em", "embed", "fieldset", "figcaption", "figure", "footer", "form", "h1", "h2", "h3",
    "h4", "h5", "h6", "head", "header", "hgroup", "hr", "html", "i", "iframe", "img", "input",
    "ins", "kbd", "label", "legend", "li", "link", "main", "map", "mark", "menu", "meta",
    "meter", "nav", "noscript", "object", "ol", "optgroup", "option", "output", "p", "picture",
    "pre", "progress", "q", "rp", "rt", "ruby", "s", "samp", "script", "search", "section",
    "select", "slot", "small", "source", "span", "strong", "style", "sub", "summary", "sup",
    "table", "tbody", "td", "template", "textarea", "tfoot", "th", "thead", "time", "title",
    "tr", "track", "u", "ul", "var", "video", "wbr",
];

/// Check the valid custom element name production
///
/// Lowercase ASCII letter first, at least one hyphen, no ASCII uppercase,
/// and not one of the reserved SVG/MathML names.
pub fn is_valid_custom_element_name(name: &str) -> bool {
    let mut chars = name.chars();
    if !chars.next().is_some_and(|c| c.is_ascii_lowercase()) {
        return false;
    }
    if !name.contains('-') || RESERVED_NAMES.contains(&name) {
        return false;
    }
    chars.all(|c| {
        matches!(c,
            '-' | '.' | '_' | '0'..='9' | 'a'..='z' | '\u{B7}'
            | '\u{C0}'..='\u{D6}' | '\u{D8}'..='\u{F6}' | '\u{F8}'..='\u{37D}'
            | '\u{37F}'..='\u{1FFF}' | '\u{200C}'..='\u{200D}' | '\u{203F}'..='\u{2040}'
            | '\u{2070}'..='\u{218F}' | '\u{2C00}'..='\u{2FEF}' | '\u{3001}'..='\u{D7FF}'
            | '\u{F900}'..='\u{FDCF}' | '\u{FDF0}'..='\u{FFFD}' | '\u{10000}'..='\u{EFFFF}')
    })
}

/// Lifecycle callback kinds a definition can support
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallbackKind {
    Connected,
    Disconnected,
    Adopted,
    AttributeChanged,
    FormAssociated,
    FormReset,
    FormDisabled,
    FormStateRestore,
}

impl CallbackKind {
    fn is_form_callback(self) -> bool {
        matches!(
            self,
            Self::FormAssociated | Self::FormReset | Self::FormDisabled | Self::FormStateRestore
        )
    }
}

/// A lifecycle callback invocation with its arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleCallback {
    Connected,
    Disconnected,
    Adopted {
        old_document: NodeId,
        new_document: NodeId,
    },
    AttributeChanged {
        name: String,
        old_value: Option<String>,
        new_value: Option<String>,
        namespace: Option<String>,
    },
    FormAssociated {
        form: Option<NodeId>,
    },
    FormReset,
    FormDisabled {
        disabled: bool,
    },
    FormStateRestore {
        state: String,
        mode: String,
    },
}

impl LifecycleCallback {
    pub fn kind(&self) -> CallbackKind {
        match self {
            Self::Connected => CallbackKind::Connected,
            Self::Disconnected => CallbackKind::Disconnected,
            Self::Adopted { .. } => CallbackKind::Adopted,
            Self::AttributeChanged { .. } => CallbackKind::AttributeChanged,
            Self::FormAssociated { .. } => CallbackKind::FormAssociated,
            Self::FormReset => CallbackKind::FormReset,
            Self::FormDisabled { .. } => CallbackKind::FormDisabled,
            Self::FormStateRestore { .. } => CallbackKind::FormStateRestore,
        }
    }
}

/// Script-side half of a custom element definition
///
/// `construct` runs for synchronous creation and for upgrades. The other
/// methods are read once, when the definition is registered.
pub trait CustomElementConstructor {
    fn construct(&self, tree: &mut DomTree, element: NodeId) -> Result<(), ScriptError>;

    fn observed_attributes(&self) -> Vec<String> {
        Vec::new()
    }

    fn lifecycle_callbacks(&self) -> Vec<CallbackKind> {
        Vec::new()
    }

    fn form_associated(&self) -> bool {
        false
    }

    /// Invoked for each enqueued callback reaction
    fn callback(
        &self,
        _tree: &mut DomTree,
        _element: NodeId,
        _callback: &LifecycleCallback,
    ) -> Result<(), ScriptError> {
        Ok(())
    }
}

/// Options for [`DomTree::define`]
#[derive(Debug, Clone, Default)]
pub struct DefinitionOptions {
    /// Built-in element this definition customizes
    pub extends: Option<String>,
}

/// Custom element definition
pub struct CustomElementDefinition {
    name: String,
    local_name: String,
    constructor: Rc<dyn CustomElementConstructor>,
    observed_attributes: HashSet<String>,
    callbacks: HashSet<CallbackKind>,
    form_associated: bool,
}

impl CustomElementDefinition {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Element local name; differs from `name` for customized built-ins
    pub fn local_name(&self) -> &str {
        &self.local_name
    }

    pub fn is_autonomous(&self) -> bool {
        self.name == self.local_name
    }

    pub fn constructor(&self) -> &Rc<dyn CustomElementConstructor> {
        &self.constructor
    }

    pub fn observes(&self, attribute: &str) -> bool {
        self.observed_attributes.contains(attribute)
    }

    pub fn has_callback(&self, kind: CallbackKind) -> bool {
        self.callbacks.contains(&kind)
    }

    pub fn is_form_associated(&self) -> bool {
        self.form_associated
    }
}

impl fmt::Debug for CustomElementDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomElementDefinition")
            .field("name", &self.name)
            .field("local_name", &self.local_name)
            .field("observed_attributes", &self.observed_attributes)
            .field("callbacks", &self.callbacks)
            .field("form_associated", &self.form_associated)
            .finish_non_exhaustive()
    }
}

/// Custom elements registry
#[derive(Debug, Default)]
pub struct CustomElementRegistry {
    definitions: HashMap<String, Rc<CustomElementDefinition>>,
}

impl CustomElementRegistry {
    /// Get a definition by name
    pub fn get(&self, name: &str) -> Option<&Rc<CustomElementDefinition>> {
        self.definitions.get(name)
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    fn uses_constructor(&self, constructor: &Rc<dyn CustomElementConstructor>) -> bool {
        self.definitions
            .values()
            .any(|d| Rc::ptr_eq(&d.constructor, constructor))
    }

    /// Definition matching an element name, autonomous or customized built-in
    fn find(&self, local_name: &str, is: Option<&str>) -> Option<&Rc<CustomElementDefinition>> {
        if let Some(def) = self.definitions.get(local_name)
            && def.local_name == local_name
        {
            return Some(def);
        }
        let def = self.definitions.get(is?)?;
        (def.local_name == local_name).then_some(def)
    }
}

impl DomTree {
    /// The registry shared by every document in this tree
    pub fn custom_elements(&self) -> &CustomElementRegistry {
        &self.registry
    }

    /// `CustomElementRegistry.define`
    pub fn define(
        &mut self,
        name: &str,
        constructor: Rc<dyn CustomElementConstructor>,
        options: DefinitionOptions,
    ) -> DomResult<()> {
        self.with_reactions(|tree| tree.define_inner(name, constructor, options))
    }

    fn define_inner(
        &mut self,
        name: &str,
        constructor: Rc<dyn CustomElementConstructor>,
        options: DefinitionOptions,
    ) -> DomResult<()> {
        if !is_valid_custom_element_name(name) {
            return Err(DomError::Syntax(name.to_string()));
        }
        if self.registry.is_defined(name) {
            return Err(DomError::NotSupported(format!("{name} is already defined")));
        }
        if self.registry.uses_constructor(&constructor) {
            return Err(DomError::NotSupported("constructor is already registered".into()));
        }

        let mut local_name = name.to_string();
        if let Some(extends) = options.extends {
            if is_valid_custom_element_name(&extends) {
                return Err(DomError::NotSupported(format!("cannot extend custom element {extends}")));
            }
            if !KNOWN_HTML_ELEMENTS.contains(&extends.as_str()) {
                return Err(DomError::NotSupported(format!("{extends} is not an HTML element")));
            }
            local_name = extends;
        }

        let form_associated = constructor.form_associated();
        let callbacks = constructor
            .lifecycle_callbacks()
            .into_iter()
            .filter(|kind| form_associated || !kind.is_form_callback())
            .collect();
        let observed_attributes = constructor.observed_attributes().into_iter().collect();

        let definition = Rc::new(CustomElementDefinition {
            name: name.to_string(),
            local_name,
            constructor,
            observed_attributes,
            callbacks,
            form_associated,
        });
        self.registry.definitions.insert(name.to_string(), definition.clone());
        tracing::debug!("Defined custom element {} (local name {})", name, definition.local_name);

        for element in self.upgrade_candidates(&definition) {
            self.enqueue_upgrade_reaction(element, definition.clone());
        }
        Ok(())
    }

    /// Undefined elements in documents with a browsing context, in tree order
    fn upgrade_candidates(&self, definition: &CustomElementDefinition) -> Vec<NodeId> {
        let documents: Vec<NodeId> = self
            .node_ids()
            .filter(|&id| {
                self.node(id)
                    .as_document()
                    .is_some_and(|d| d.has_browsing_context())
            })
            .collect();
        let expected_is = (!definition.is_autonomous()).then_some(definition.name.as_str());

        documents
            .into_iter()
            .flat_map(|document| self.descendants(document))
            .filter(|&id| {
                self.element(id).is_some_and(|e| {
                    e.is_html()
                        && e.local_name == definition.local_name
                        && e.state == CustomElementState::Undefined
                        && e.is_value.as_deref() == expected_is
                })
            })
            .collect()
    }

    /// `CustomElementRegistry.upgrade`: try to upgrade every inclusive descendant
    pub fn upgrade(&mut self, root: NodeId) {
        self.with_reactions(|tree| {
            let elements: Vec<NodeId> = tree
                .inclusive_descendants(root)
                .filter(|&id| tree.node(id).is_element())
                .collect();
            for element in elements {
                tree.try_upgrade(element);
            }
        })
    }

    /// Look up a definition for an element about to be created in `document`
    ///
    /// Only HTML elements in documents with a browsing context match.
    pub fn lookup_definition(
        &self,
        document: NodeId,
        namespace: Option<&str>,
        local_name: &str,
        is: Option<&str>,
    ) -> Option<Rc<CustomElementDefinition>> {
        if namespace != Some(ns::HTML) {
            return None;
        }
        let has_browsing_context = self
            .node(document)
            .as_document()
            .is_some_and(|d| d.has_browsing_context());
        if !has_browsing_context {
            return None;
        }
        self.registry.find(local_name, is).cloned()
    }

    /// Enqueue an upgrade reaction if a definition now matches `element`
    pub(crate) fn try_upgrade(&mut self, element: NodeId) {
        let Some(data) = self.element(element) else {
            return;
        };
        let definition = self.lookup_definition(
            self.owner_document(element),
            data.namespace(),
            data.local_name(),
            data.is_value(),
        );
        if let Some(definition) = definition {
            self.enqueue_upgrade_reaction(element, definition);
        }
    }

    pub(crate) fn enqueue_upgrade_reaction(&mut self, element: NodeId, definition: Rc<CustomElementDefinition>) {
        self.enqueue_reaction(Reaction::Upgrade { element, definition });
    }

    /// Enqueue a lifecycle callback if the element's definition wants it
    pub(crate) fn enqueue_callback_reaction(&mut self, element: NodeId, callback: LifecycleCallback) {
        let Some(definition) = self.element(element).and_then(|e| e.definition.as_ref()) else {
            return;
        };
        if !definition.has_callback(callback.kind()) {
            return;
        }
        if let LifecycleCallback::AttributeChanged { name, .. } = &callback
            && !definition.observes(name)
        {
            return;
        }
        self.enqueue_reaction(Reaction::Callback { element, callback });
    }

    /// Upgrade an element with a definition
    ///
    /// The element stays `Failed` if the constructor returns an error.
    pub(crate) fn run_upgrade(
        &mut self,
        element: NodeId,
        definition: &Rc<CustomElementDefinition>,
    ) -> Result<(), ScriptError> {
        let Some(data) = self.node_mut(element).as_element_mut() else {
            return Ok(());
        };
        if !matches!(
            data.state,
            CustomElementState::Undefined | CustomElementState::Uncustomized
        ) {
            return Ok(());
        }
        data.definition = Some(definition.clone());
        data.state = CustomElementState::Failed;

        let existing: Vec<LifecycleCallback> = data
            .attrs
            .iter()
            .map(|attr| LifecycleCallback::AttributeChanged {
                name: attr.local_name.clone(),
                old_value: None,
                new_value: Some(attr.value.clone()),
                namespace: attr.namespace.clone(),
            })
            .collect();
        for callback in existing {
            self.enqueue_callback_reaction(element, callback);
        }
        if self.is_connected(element) {
            self.enqueue_callback_reaction(element, LifecycleCallback::Connected);
        }

        tracing::trace!(?element, name = %definition.name, "upgrading");
        let constructor = definition.constructor.clone();
        if let Err(err) = constructor.construct(self, element) {
            if let Some(data) = self.node_mut(element).as_element_mut() {
                data.definition = None;
            }
            return Err(err);
        }

        if let Some(data) = self.node_mut(element).as_element_mut() {
            data.state = CustomElementState::Custom;
        }
        Ok(())
    }

    /// The create-an-element algorithm
    ///
    /// With `synchronous` set, a matching definition runs its constructor now;
    /// otherwise the element gets an upgrade reaction. Constructor failures
    /// are reported and leave the element `Failed`.
    pub(crate) fn create_an_element(
        &mut self,
        document: NodeId,
        local_name: &str,
        namespace: Option<&str>,
        prefix: Option<&str>,
        is: Option<&str>,
        synchronous: bool,
    ) -> NodeId {
        let definition = self.lookup_definition(document, namespace, local_name, is);
        let element = self.alloc_element(document, local_name, namespace, prefix);

        match definition {
            Some(definition) if !definition.is_autonomous() => {
                let data = self.element_data_mut(element);
                data.is_value = Some(definition.name.clone());
                data.state = CustomElementState::Undefined;
                if synchronous {
                    if let Err(err) = self.run_upgrade(element, &definition) {
                        self.report_error(&err);
                    }
                } else {
                    self.enqueue_upgrade_reaction(element, definition);
                }
            }
            Some(definition) if synchronous => {
                self.construct_synchronously(element, definition);
            }
            Some(definition) => {
                self.element_data_mut(element).state = CustomElementState::Undefined;
                self.enqueue_upgrade_reaction(element, definition);
            }
            None => self.mark_undefined(element, local_name, namespace, is),
        }
        element
    }

    /// Allocate an element without consulting definitions
    pub(crate) fn create_unresolved_element(
        &mut self,
        document: NodeId,
        local_name: &str,
        namespace: Option<&str>,
        is: Option<&str>,
    ) -> NodeId {
        let element = self.alloc_element(document, local_name, namespace, None);
        self.mark_undefined(element, local_name, namespace, is);
        element
    }

    /// Run the constructor for an element created without a definition
    ///
    /// The definition is looked up in `document`. Returns false when none
    /// matches or the element is no longer `Undefined`.
    pub fn construct_for_token(&mut self, document: NodeId, element: NodeId) -> bool {
        let Some(data) = self.element(element) else {
            return false;
        };
        if data.custom_element_state() != CustomElementState::Undefined {
            return false;
        }
        let Some(definition) = self.lookup_definition(document, data.namespace(), data.local_name(), data.is_value())
        else {
            return false;
        };

        if definition.is_autonomous() {
            self.construct_synchronously(element, definition);
        } else {
            self.element_data_mut(element).is_value = Some(definition.name.clone());
            if let Err(err) = self.run_upgrade(element, &definition) {
                self.report_error(&err);
            }
        }
        true
    }

    /// Record `is` and mark potential custom elements `Undefined`
    fn mark_undefined(&mut self, element: NodeId, local_name: &str, namespace: Option<&str>, is: Option<&str>) {
        let is_html = namespace == Some(ns::HTML);
        let data = self.element_data_mut(element);
        data.is_value = is.map(str::to_string);
        if is_html && (is_valid_custom_element_name(local_name) || is.is_some()) {
            data.state = CustomElementState::Undefined;
        }
    }

    fn construct_synchronously(&mut self, element: NodeId, definition: Rc<CustomElementDefinition>) {
        {
            let data = self.element_data_mut(element);
            data.state = CustomElementState::Precustomized;
            data.definition = Some(definition.clone());
        }

        tracing::trace!(?element, name = %definition.name, "constructing synchronously");
        let result = definition.constructor.construct(self, element);

        let data = self.element_data_mut(element);
        match result {
            Ok(()) => data.state = CustomElementState::Custom,
            Err(err) => {
                data.state = CustomElementState::Failed;
                data.definition = None;
                self.report_error(&err);
            }
        }
    }

    /// Allocate a bare element; HTML templates also get their contents fragment
    fn alloc_element(
        &mut self,
        document: NodeId,
        local_name: &str,
        namespace: Option<&str>,
        prefix: Option<&str>,
    ) -> NodeId {
        let data = ElementData::new(
            local_name.to_string(),
            namespace.map(str::to_string),
            prefix.map(str::to_string),
        );
        let is_template = data.is_html_template();
        let element = self.push_node(NodeData::Element(data), document);

        if is_template {
            let owner = self.template_contents_owner(document);
            let contents = self.push_node(
                NodeData::DocumentFragment(FragmentData { host: Some(element) }),
                owner,
            );
            self.element_data_mut(element).template_contents = Some(contents);
        }
        element
    }

    fn element_data_mut(&mut self, element: NodeId) -> &mut ElementData {
        match &mut self.node_mut(element).data {
            NodeData::Element(data) => data,
            _ => unreachable!("node {element:?} was allocated as an element"),
        }
    }
}
