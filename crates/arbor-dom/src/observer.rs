//! Mutation Observer API
//!
//! Records are queued per observer as the tree changes and delivered in one
//! batch per observer at the next microtask checkpoint.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::microtask::Microtask;
use crate::{DomError, DomResult, DomTree, NodeId, ScriptError};

/// Observer identifier, ordered by creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(u32);

/// Mutation type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationType {
    Attributes,
    CharacterData,
    ChildList,
}

impl MutationType {
    /// `MutationRecord.type` string
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Attributes => "attributes",
            Self::CharacterData => "characterData",
            Self::ChildList => "childList",
        }
    }
}

/// Mutation record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRecord {
    pub mutation_type: MutationType,
    pub target: NodeId,
    pub added_nodes: Vec<NodeId>,
    pub removed_nodes: Vec<NodeId>,
    pub previous_sibling: Option<NodeId>,
    pub next_sibling: Option<NodeId>,
    pub attribute_name: Option<String>,
    pub attribute_namespace: Option<String>,
    pub old_value: Option<String>,
}

/// Mutation observer options
///
/// `None` means the member was not passed; [`DomTree::observe`] fills in
/// implied values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MutationObserverInit {
    pub child_list: bool,
    pub attributes: Option<bool>,
    pub character_data: Option<bool>,
    pub subtree: bool,
    pub attribute_old_value: Option<bool>,
    pub character_data_old_value: Option<bool>,
    pub attribute_filter: Option<Vec<String>>,
}

impl MutationObserverInit {
    fn normalize(self) -> DomResult<ObserverOptions> {
        let attributes = self
            .attributes
            .unwrap_or(self.attribute_old_value.is_some() || self.attribute_filter.is_some());
        let character_data = self
            .character_data
            .unwrap_or(self.character_data_old_value.is_some());
        let attribute_old_value = self.attribute_old_value.unwrap_or(false);
        let character_data_old_value = self.character_data_old_value.unwrap_or(false);

        if !self.child_list && !attributes && !character_data {
            return Err(DomError::Type("one of childList, attributes or characterData must be true"));
        }
        if attribute_old_value && !attributes {
            return Err(DomError::Type("attributeOldValue requires attributes"));
        }
        if self.attribute_filter.is_some() && !attributes {
            return Err(DomError::Type("attributeFilter requires attributes"));
        }
        if character_data_old_value && !character_data {
            return Err(DomError::Type("characterDataOldValue requires characterData"));
        }

        Ok(ObserverOptions {
            child_list: self.child_list,
            attributes,
            character_data,
            subtree: self.subtree,
            attribute_old_value,
            character_data_old_value,
            attribute_filter: self.attribute_filter,
        })
    }
}

/// Normalized options of a registration
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ObserverOptions {
    child_list: bool,
    attributes: bool,
    character_data: bool,
    subtree: bool,
    attribute_old_value: bool,
    character_data_old_value: bool,
    attribute_filter: Option<Vec<String>>,
}

/// A registration stored on an observed node
///
/// Transient registrations carry the node of the registration they were
/// copied from, and live until the observer's next delivery.
#[derive(Debug, Clone)]
pub(crate) struct RegisteredObserver {
    pub(crate) observer: ObserverId,
    pub(crate) options: ObserverOptions,
    pub(crate) source: Option<NodeId>,
}

/// Receives batches of mutation records
pub trait MutationCallback {
    fn call(
        &self,
        tree: &mut DomTree,
        records: Vec<MutationRecord>,
        observer: ObserverId,
    ) -> Result<(), ScriptError>;
}

impl<F> MutationCallback for F
where
    F: Fn(&mut DomTree, Vec<MutationRecord>, ObserverId) -> Result<(), ScriptError>,
{
    fn call(
        &self,
        tree: &mut DomTree,
        records: Vec<MutationRecord>,
        observer: ObserverId,
    ) -> Result<(), ScriptError> {
        self(tree, records, observer)
    }
}

struct MutationObserver {
    callback: Rc<dyn MutationCallback>,
    pending_records: Vec<MutationRecord>,
    /// Nodes carrying a registration for this observer
    nodes: Vec<NodeId>,
}

impl fmt::Debug for MutationObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutationObserver")
            .field("pending_records", &self.pending_records.len())
            .field("nodes", &self.nodes)
            .finish_non_exhaustive()
    }
}

/// All observers of a tree
#[derive(Debug, Default)]
pub(crate) struct MutationObservers {
    observers: BTreeMap<ObserverId, MutationObserver>,
    next_id: u32,
    delivery_scheduled: bool,
}

/// One interested observer for the mutation being queued
struct Interested {
    observer: ObserverId,
    old_value: Option<String>,
}

impl DomTree {
    /// Create a mutation observer; it observes nothing until [`DomTree::observe`]
    pub fn create_mutation_observer(&mut self, callback: impl MutationCallback + 'static) -> ObserverId {
        let observers = &mut self.observers;
        let id = ObserverId(observers.next_id);
        observers.next_id += 1;
        observers.observers.insert(
            id,
            MutationObserver {
                callback: Rc::new(callback),
                pending_records: Vec::new(),
                nodes: Vec::new(),
            },
        );
        id
    }

    /// `MutationObserver.observe`
    pub fn observe(&mut self, observer: ObserverId, target: NodeId, options: MutationObserverInit) -> DomResult<()> {
        let options = options.normalize()?;
        self.expect_node(target)?;
        let Some(state) = self.observers.observers.get_mut(&observer) else {
            return Err(DomError::NotFound("mutation observer"));
        };

        let existing = self.nodes[target.index()]
            .registered_observers
            .iter()
            .position(|r| r.observer == observer && r.source.is_none());

        match existing {
            Some(index) => {
                for &node in &state.nodes {
                    self.nodes[node.index()]
                        .registered_observers
                        .retain(|r| !(r.observer == observer && r.source == Some(target)));
                }
                self.nodes[target.index()].registered_observers[index].options = options;
            }
            None => {
                self.nodes[target.index()].registered_observers.push(RegisteredObserver {
                    observer,
                    options,
                    source: None,
                });
                if !state.nodes.contains(&target) {
                    state.nodes.push(target);
                }
            }
        }
        tracing::trace!(?observer, ?target, "observe");
        Ok(())
    }

    /// `MutationObserver.disconnect`: drop every registration and pending record
    pub fn disconnect(&mut self, observer: ObserverId) {
        let Some(state) = self.observers.observers.get_mut(&observer) else {
            return;
        };
        for node in state.nodes.drain(..) {
            self.nodes[node.index()]
                .registered_observers
                .retain(|r| r.observer != observer);
        }
        state.pending_records.clear();
    }

    /// `MutationObserver.takeRecords`
    pub fn take_records(&mut self, observer: ObserverId) -> Vec<MutationRecord> {
        self.observers
            .observers
            .get_mut(&observer)
            .map(|state| std::mem::take(&mut state.pending_records))
            .unwrap_or_default()
    }

    /// Disconnect and forget an observer
    pub fn remove_mutation_observer(&mut self, observer: ObserverId) {
        self.disconnect(observer);
        self.observers.observers.remove(&observer);
    }

    /// Queue a record for every interested observer
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn queue_mutation_record(
        &mut self,
        mutation_type: MutationType,
        target: NodeId,
        name: Option<&str>,
        namespace: Option<&str>,
        old_value: Option<&str>,
        added_nodes: Vec<NodeId>,
        removed_nodes: Vec<NodeId>,
        previous_sibling: Option<NodeId>,
        next_sibling: Option<NodeId>,
    ) {
        if self.observers.observers.is_empty() {
            return;
        }

        let mut interested: Vec<Interested> = Vec::new();
        for node in self.inclusive_ancestors(target) {
            for registered in &self.nodes[node.index()].registered_observers {
                let options = &registered.options;
                if node != target && !options.subtree {
                    continue;
                }
                let wanted = match mutation_type {
                    MutationType::ChildList => options.child_list,
                    MutationType::CharacterData => options.character_data,
                    MutationType::Attributes => {
                        options.attributes
                            && match &options.attribute_filter {
                                Some(filter) => {
                                    namespace.is_none()
                                        && name.is_some_and(|n| filter.iter().any(|f| f == n))
                                }
                                None => true,
                            }
                    }
                };
                if !wanted {
                    continue;
                }

                let index = match interested.iter().position(|i| i.observer == registered.observer) {
                    Some(index) => index,
                    None => {
                        interested.push(Interested {
                            observer: registered.observer,
                            old_value: None,
                        });
                        interested.len() - 1
                    }
                };
                let wants_old_value = match mutation_type {
                    MutationType::Attributes => options.attribute_old_value,
                    MutationType::CharacterData => options.character_data_old_value,
                    MutationType::ChildList => false,
                };
                if wants_old_value {
                    interested[index].old_value = old_value.map(str::to_string);
                }
            }
        }

        if interested.is_empty() {
            return;
        }
        tracing::trace!(mutation = mutation_type.as_str(), ?target, observers = interested.len(), "queue mutation record");

        for Interested { observer, old_value } in interested {
            let Some(state) = self.observers.observers.get_mut(&observer) else {
                continue;
            };
            state.pending_records.push(MutationRecord {
                mutation_type,
                target,
                added_nodes: added_nodes.clone(),
                removed_nodes: removed_nodes.clone(),
                previous_sibling,
                next_sibling,
                attribute_name: name.map(str::to_string),
                attribute_namespace: namespace.map(str::to_string),
                old_value,
            });
        }
        self.queue_mutation_observer_microtask();
    }

    /// Child list record shorthand
    pub(crate) fn queue_tree_mutation_record(
        &mut self,
        target: NodeId,
        added_nodes: Vec<NodeId>,
        removed_nodes: Vec<NodeId>,
        previous_sibling: Option<NodeId>,
        next_sibling: Option<NodeId>,
    ) {
        if added_nodes.is_empty() && removed_nodes.is_empty() {
            return;
        }
        self.queue_mutation_record(
            MutationType::ChildList,
            target,
            None,
            None,
            None,
            added_nodes,
            removed_nodes,
            previous_sibling,
            next_sibling,
        );
    }

    /// Copy subtree registrations from the old ancestors onto a removed node
    pub(crate) fn add_transient_registrations(&mut self, removed: NodeId, old_parent: NodeId) {
        if self.observers.observers.is_empty() {
            return;
        }
        let mut transient = Vec::new();
        for ancestor in self.inclusive_ancestors(old_parent) {
            for registered in &self.nodes[ancestor.index()].registered_observers {
                if registered.options.subtree {
                    transient.push(RegisteredObserver {
                        observer: registered.observer,
                        options: registered.options.clone(),
                        source: Some(ancestor),
                    });
                }
            }
        }

        for registered in transient {
            if let Some(state) = self.observers.observers.get_mut(&registered.observer)
                && !state.nodes.contains(&removed)
            {
                state.nodes.push(removed);
            }
            self.nodes[removed.index()].registered_observers.push(registered);
        }
    }

    fn queue_mutation_observer_microtask(&mut self) {
        if std::mem::replace(&mut self.observers.delivery_scheduled, true) {
            return;
        }
        self.microtasks.push(Microtask::NotifyMutationObservers);
    }

    /// Deliver pending records, one callback per observer in creation order
    pub(crate) fn notify_mutation_observers(&mut self) {
        self.observers.delivery_scheduled = false;
        let ids: Vec<ObserverId> = self.observers.observers.keys().copied().collect();

        for id in ids {
            // Removed or disconnected by an earlier callback in this pass
            let Some(state) = self.observers.observers.get_mut(&id) else {
                continue;
            };
            let records = std::mem::take(&mut state.pending_records);
            let callback = state.callback.clone();

            let nodes = std::mem::take(&mut state.nodes);
            let mut kept = Vec::with_capacity(nodes.len());
            for node in nodes {
                let registrations = &mut self.nodes[node.index()].registered_observers;
                registrations.retain(|r| !(r.observer == id && r.source.is_some()));
                if registrations.iter().any(|r| r.observer == id) {
                    kept.push(node);
                }
            }
            if let Some(state) = self.observers.observers.get_mut(&id) {
                state.nodes = kept;
            }

            if records.is_empty() {
                continue;
            }
            tracing::trace!(observer = ?id, records = records.len(), "delivering mutation records");
            if let Err(err) = callback.call(self, records, id) {
                self.report_error(&err);
            }
        }
    }
}
