//! Element Attributes
//!
//! Ordered attribute storage plus the tree-level get/set/remove operations
//! that feed mutation observers and `attributeChangedCallback`.

use std::borrow::Cow;

use crate::custom_elements::LifecycleCallback;
use crate::observer::MutationType;
use crate::{DomError, DomResult, DomTree, NodeId, ns};

/// Single attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub(crate) namespace: Option<String>,
    pub(crate) prefix: Option<String>,
    pub(crate) local_name: String,
    pub(crate) value: String,
}

impl Attribute {
    pub fn new(local_name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            namespace: None,
            prefix: None,
            local_name: local_name.into(),
            value: value.into(),
        }
    }

    pub fn with_namespace(
        namespace: Option<String>,
        prefix: Option<String>,
        local_name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            namespace,
            prefix,
            local_name: local_name.into(),
            value: value.into(),
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

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn qualified_name(&self) -> Cow<'_, str> {
        match &self.prefix {
            Some(prefix) => Cow::Owned(format!("{}:{}", prefix, self.local_name)),
            None => Cow::Borrowed(&self.local_name),
        }
    }

    fn matches_qualified_name(&self, name: &str) -> bool {
        match &self.prefix {
            Some(prefix) => name
                .split_once(':')
                .is_some_and(|(p, l)| p == prefix && l == self.local_name),
            None => name == self.local_name,
        }
    }

    fn matches(&self, namespace: Option<&str>, local_name: &str) -> bool {
        self.namespace.as_deref() == namespace && self.local_name == local_name
    }
}

/// Attribute list of an element, in insertion order
///
/// Changing a value never moves an attribute; only removal and re-adding does.
#[derive(Debug, Clone, Default)]
pub struct AttributeList {
    attributes: Vec<Attribute>,
}

impl AttributeList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Get attribute by index
    pub fn item(&self, index: usize) -> Option<&Attribute> {
        self.attributes.get(index)
    }

    /// First attribute whose qualified name is `name`
    pub fn get_by_qualified_name(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.matches_qualified_name(name))
    }

    pub fn get_by_namespace(&self, namespace: Option<&str>, local_name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.matches(namespace, local_name))
    }

    /// Qualified names in order
    pub fn names(&self) -> Vec<String> {
        self.attributes.iter().map(|a| a.qualified_name().into_owned()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes.iter()
    }

    fn position_by_qualified_name(&self, name: &str) -> Option<usize> {
        self.attributes.iter().position(|a| a.matches_qualified_name(name))
    }

    fn position_by_namespace(&self, namespace: Option<&str>, local_name: &str) -> Option<usize> {
        self.attributes.iter().position(|a| a.matches(namespace, local_name))
    }

    fn append(&mut self, attr: Attribute) {
        self.attributes.push(attr);
    }

    fn replace_value(&mut self, index: usize, value: String) -> String {
        std::mem::replace(&mut self.attributes[index].value, value)
    }

    fn remove(&mut self, index: usize) -> Attribute {
        self.attributes.remove(index)
    }
}

/// XML `Name` production, as used for element and attribute names
pub(crate) fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    is_name_start_char(first) && chars.all(is_name_char)
}

fn is_name_start_char(c: char) -> bool {
    c.is_ascii_alphabetic()
        || c == '_'
        || c == ':'
        || matches!(c,
            '\u{C0}'..='\u{D6}' | '\u{D8}'..='\u{F6}' | '\u{F8}'..='\u{2FF}'
            | '\u{370}'..='\u{37D}' | '\u{37F}'..='\u{1FFF}' | '\u{200C}'..='\u{200D}'
            | '\u{2070}'..='\u{218F}' | '\u{2C00}'..='\u{2FEF}' | '\u{3001}'..='\u{D7FF}'
            | '\u{F900}'..='\u{FDCF}' | '\u{FDF0}'..='\u{FFFD}' | '\u{10000}'..='\u{EFFFF}')
}

fn is_name_char(c: char) -> bool {
    is_name_start_char(c)
        || c.is_ascii_digit()
        || c == '-'
        || c == '.'
        || matches!(c, '\u{B7}' | '\u{300}'..='\u{36F}' | '\u{203F}'..='\u{2040}')
}

/// Validate a qualified name and split it against a namespace.
///
/// Returns `(namespace, prefix, local_name)`.
pub(crate) fn validate_and_extract(
    namespace: Option<&str>,
    qualified_name: &str,
) -> DomResult<(Option<String>, Option<String>, String)> {
    let namespace = namespace.filter(|n| !n.is_empty());

    if !is_valid_name(qualified_name) {
        return Err(DomError::Syntax(qualified_name.to_string()));
    }
    let (prefix, local_name) = match qualified_name.split_once(':') {
        Some((prefix, local)) => {
            if prefix.is_empty() || local.is_empty() || local.contains(':') {
                return Err(DomError::Syntax(qualified_name.to_string()));
            }
            (Some(prefix), local)
        }
        None => (None, qualified_name),
    };

    if prefix.is_some() && namespace.is_none() {
        return Err(DomError::Namespace(format!("prefix on {qualified_name:?} requires a namespace")));
    }
    if prefix == Some("xml") && namespace != Some(ns::XML) {
        return Err(DomError::Namespace("the xml prefix is bound to the XML namespace".into()));
    }
    let is_xmlns = qualified_name == "xmlns" || prefix == Some("xmlns");
    if is_xmlns != (namespace == Some(ns::XMLNS)) {
        return Err(DomError::Namespace("xmlns names and the XMLNS namespace go together".into()));
    }

    Ok((
        namespace.map(str::to_string),
        prefix.map(str::to_string),
        local_name.to_string(),
    ))
}

impl DomTree {
    /// HTML elements in HTML documents match attribute names case-insensitively
    fn normalize_attribute_name<'a>(&self, element: NodeId, name: &'a str) -> Cow<'a, str> {
        let is_html_element = self.node(element).as_element().is_some_and(|e| e.is_html());
        if is_html_element && self.is_html_document(self.owner_document(element)) {
            Cow::Owned(name.to_ascii_lowercase())
        } else {
            Cow::Borrowed(name)
        }
    }

    pub fn get_attribute(&self, element: NodeId, name: &str) -> Option<&str> {
        let name = self.normalize_attribute_name(element, name);
        self.element(element)?
            .attrs
            .get_by_qualified_name(&name)
            .map(Attribute::value)
    }

    pub fn get_attribute_ns(&self, element: NodeId, namespace: Option<&str>, local_name: &str) -> Option<&str> {
        let namespace = namespace.filter(|n| !n.is_empty());
        self.element(element)?
            .attrs
            .get_by_namespace(namespace, local_name)
            .map(Attribute::value)
    }

    pub fn has_attribute(&self, element: NodeId, name: &str) -> bool {
        self.get_attribute(element, name).is_some()
    }

    pub fn attribute_names(&self, element: NodeId) -> Vec<String> {
        self.element(element).map(|e| e.attrs.names()).unwrap_or_default()
    }

    /// Attribute list in insertion order
    pub fn attributes(&self, element: NodeId) -> Option<&AttributeList> {
        self.element(element).map(|e| &e.attrs)
    }

    /// `Element.setAttribute`
    pub fn set_attribute(&mut self, element: NodeId, name: &str, value: &str) -> DomResult<()> {
        self.with_reactions(|tree| {
            tree.expect_element(element)?;
            if !is_valid_name(name) {
                return Err(DomError::Syntax(name.to_string()));
            }
            let name = tree.normalize_attribute_name(element, name).into_owned();
            let position = tree.node(element).as_element().and_then(|e| e.attrs.position_by_qualified_name(&name));
            match position {
                Some(index) => tree.change_attribute(element, index, value.to_string()),
                None => tree.append_attribute(element, Attribute::new(name, value)),
            }
            Ok(())
        })
    }

    /// `Element.setAttributeNS`
    pub fn set_attribute_ns(
        &mut self,
        element: NodeId,
        namespace: Option<&str>,
        qualified_name: &str,
        value: &str,
    ) -> DomResult<()> {
        self.with_reactions(|tree| {
            tree.expect_element(element)?;
            let (namespace, prefix, local_name) = validate_and_extract(namespace, qualified_name)?;
            tree.set_attribute_value(element, &local_name, value, prefix, namespace);
            Ok(())
        })
    }

    /// `Element.removeAttribute`; removing a missing attribute is not an error
    pub fn remove_attribute(&mut self, element: NodeId, name: &str) -> DomResult<()> {
        self.with_reactions(|tree| {
            tree.expect_element(element)?;
            let name = tree.normalize_attribute_name(element, name).into_owned();
            let position = tree.node(element).as_element().and_then(|e| e.attrs.position_by_qualified_name(&name));
            if let Some(index) = position {
                tree.remove_attribute_at(element, index);
            }
            Ok(())
        })
    }

    pub fn remove_attribute_ns(&mut self, element: NodeId, namespace: Option<&str>, local_name: &str) -> DomResult<()> {
        self.with_reactions(|tree| {
            tree.expect_element(element)?;
            let namespace = namespace.filter(|n| !n.is_empty());
            let position = tree
                .node(element)
                .as_element()
                .and_then(|e| e.attrs.position_by_namespace(namespace, local_name));
            if let Some(index) = position {
                tree.remove_attribute_at(element, index);
            }
            Ok(())
        })
    }

    /// `Element.toggleAttribute`, returns whether the attribute is now present
    pub fn toggle_attribute(&mut self, element: NodeId, name: &str, force: Option<bool>) -> DomResult<bool> {
        self.with_reactions(|tree| {
            tree.expect_element(element)?;
            if !is_valid_name(name) {
                return Err(DomError::Syntax(name.to_string()));
            }
            let name = tree.normalize_attribute_name(element, name).into_owned();
            let position = tree.node(element).as_element().and_then(|e| e.attrs.position_by_qualified_name(&name));
            match (position, force) {
                (None, Some(false)) => Ok(false),
                (None, _) => {
                    tree.append_attribute(element, Attribute::new(name, ""));
                    Ok(true)
                }
                (Some(_), Some(true)) => Ok(true),
                (Some(index), _) => {
                    tree.remove_attribute_at(element, index);
                    Ok(false)
                }
            }
        })
    }

    /// Change the attribute keyed by (namespace, local name) in place, or
    /// append it
    ///
    /// Names are not validated and no reaction scope is opened; callers that
    /// need one wrap the call in [`DomTree::with_reactions`].
    pub fn set_attribute_value(
        &mut self,
        element: NodeId,
        local_name: &str,
        value: &str,
        prefix: Option<String>,
        namespace: Option<String>,
    ) {
        let position = self
            .node(element)
            .as_element()
            .and_then(|e| e.attrs.position_by_namespace(namespace.as_deref(), local_name));
        match position {
            Some(index) => self.change_attribute(element, index, value.to_string()),
            None => self.append_attribute(
                element,
                Attribute::with_namespace(namespace, prefix, local_name, value),
            ),
        }
    }

    fn change_attribute(&mut self, element: NodeId, index: usize, value: String) {
        let Some(data) = self.node_mut(element).as_element_mut() else {
            return;
        };
        let new_value = value.clone();
        let old_value = data.attrs.replace_value(index, value);
        let attr = &data.attrs.attributes[index];
        let (namespace, local_name) = (attr.namespace.clone(), attr.local_name.clone());
        self.handle_attribute_changes(element, namespace, local_name, Some(old_value), Some(new_value));
    }

    fn append_attribute(&mut self, element: NodeId, attr: Attribute) {
        let Some(data) = self.node_mut(element).as_element_mut() else {
            return;
        };
        let (namespace, local_name, value) = (attr.namespace.clone(), attr.local_name.clone(), attr.value.clone());
        data.attrs.append(attr);
        self.handle_attribute_changes(element, namespace, local_name, None, Some(value));
    }

    fn remove_attribute_at(&mut self, element: NodeId, index: usize) {
        let Some(data) = self.node_mut(element).as_element_mut() else {
            return;
        };
        let removed = data.attrs.remove(index);
        self.handle_attribute_changes(element, removed.namespace, removed.local_name, Some(removed.value), None);
    }

    /// Observer record first, then the custom element reaction
    fn handle_attribute_changes(
        &mut self,
        element: NodeId,
        namespace: Option<String>,
        local_name: String,
        old_value: Option<String>,
        new_value: Option<String>,
    ) {
        tracing::trace!(?element, name = %local_name, "attribute changed");
        self.queue_mutation_record(
            MutationType::Attributes,
            element,
            Some(&local_name),
            namespace.as_deref(),
            old_value.as_deref(),
            Vec::new(),
            Vec::new(),
            None,
            None,
        );

        if self.element(element).is_some_and(|e| e.is_custom()) {
            self.enqueue_callback_reaction(
                element,
                LifecycleCallback::AttributeChanged {
                    name: local_name,
                    old_value,
                    new_value,
                    namespace,
                },
            );
        }
    }
}
