//! Custom Element Reactions
//!
//! Reactions queued while the tree changes run when the innermost reaction
//! scope is popped. With no scope open they go to the backup queue, which
//! drains at the next microtask checkpoint.

use std::collections::VecDeque;
use std::rc::Rc;

use crate::custom_elements::{CustomElementDefinition, LifecycleCallback};
use crate::microtask::Microtask;
use crate::node::CustomElementState;
use crate::{DomTree, NodeId};

/// A queued custom element reaction
#[derive(Debug, Clone)]
pub enum Reaction {
    Upgrade {
        element: NodeId,
        definition: Rc<CustomElementDefinition>,
    },
    Callback {
        element: NodeId,
        callback: LifecycleCallback,
    },
}

impl Reaction {
    pub fn element(&self) -> NodeId {
        match self {
            Self::Upgrade { element, .. } | Self::Callback { element, .. } => *element,
        }
    }
}

/// FIFO of reactions belonging to one scope
#[derive(Debug, Default)]
pub struct ReactionQueue {
    reactions: VecDeque<Reaction>,
}

impl ReactionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.reactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reactions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Reaction> {
        self.reactions.iter()
    }

    fn push(&mut self, reaction: Reaction) {
        self.reactions.push_back(reaction);
    }
}

impl IntoIterator for ReactionQueue {
    type Item = Reaction;
    type IntoIter = std::collections::vec_deque::IntoIter<Reaction>;

    fn into_iter(self) -> Self::IntoIter {
        self.reactions.into_iter()
    }
}

/// Stack of reaction scopes with the backup queue beneath it
#[derive(Debug, Default)]
pub(crate) struct ReactionStack {
    scopes: Vec<ReactionQueue>,
    backup: ReactionQueue,
    backup_scheduled: bool,
}

impl ReactionStack {
    pub(crate) fn depth(&self) -> usize {
        self.scopes.len()
    }

    fn push_scope(&mut self) {
        self.scopes.push(ReactionQueue::new());
    }

    fn pop_scope(&mut self) -> Option<ReactionQueue> {
        self.scopes.pop()
    }

    /// Returns true when the backup queue needs a processing microtask
    fn enqueue(&mut self, reaction: Reaction) -> bool {
        match self.scopes.last_mut() {
            Some(scope) => {
                scope.push(reaction);
                false
            }
            None => {
                self.backup.push(reaction);
                !std::mem::replace(&mut self.backup_scheduled, true)
            }
        }
    }

    fn take_backup(&mut self) -> ReactionQueue {
        self.backup_scheduled = false;
        std::mem::take(&mut self.backup)
    }
}

impl DomTree {
    /// Run `f` inside a reaction scope and invoke the reactions it queued
    ///
    /// Reactions run even when `f` fails. Past `max_reaction_depth` no new
    /// scope is pushed and reactions join the enclosing scope.
    pub fn with_reactions<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        let pushed = self.push_reaction_scope();
        let result = f(self);
        if pushed {
            self.pop_reaction_scope();
        }
        result
    }

    /// Current reaction stack depth; 0 means only the backup queue exists
    pub fn reaction_depth(&self) -> usize {
        self.reactions.depth()
    }

    pub(crate) fn push_reaction_scope(&mut self) -> bool {
        if self.reactions.depth() >= self.config.max_reaction_depth {
            tracing::warn!(
                "Reaction depth limit {} reached, joining enclosing scope",
                self.config.max_reaction_depth
            );
            return false;
        }
        self.reactions.push_scope();
        true
    }

    pub(crate) fn pop_reaction_scope(&mut self) {
        if let Some(queue) = self.reactions.pop_scope() {
            self.invoke_reactions(queue);
        }
    }

    pub(crate) fn enqueue_reaction(&mut self, reaction: Reaction) {
        tracing::trace!(element = ?reaction.element(), depth = self.reactions.depth(), "enqueue reaction");
        if self.reactions.enqueue(reaction) {
            self.microtasks.push(Microtask::ProcessBackupReactions);
        }
    }

    pub(crate) fn process_backup_reactions(&mut self) {
        let queue = self.reactions.take_backup();
        self.invoke_reactions(queue);
    }

    fn invoke_reactions(&mut self, queue: ReactionQueue) {
        for reaction in queue {
            self.with_reactions(|tree| tree.invoke_reaction(reaction));
        }
    }

    fn invoke_reaction(&mut self, reaction: Reaction) {
        match reaction {
            Reaction::Upgrade { element, definition } => {
                if let Err(err) = self.run_upgrade(element, &definition) {
                    self.report_error(&err);
                }
            }
            Reaction::Callback { element, callback } => {
                let Some(data) = self.element(element) else {
                    return;
                };
                if data.state == CustomElementState::Failed {
                    return;
                }
                let Some(definition) = data.definition.clone() else {
                    return;
                };
                tracing::trace!(?element, kind = ?callback.kind(), "invoking callback");
                let constructor = definition.constructor().clone();
                if let Err(err) = constructor.callback(self, element, &callback) {
                    self.report_error(&err);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn callback(element: u32) -> Reaction {
        Reaction::Callback {
            element: NodeId(element),
            callback: LifecycleCallback::Connected,
        }
    }

    #[test]
    fn test_enqueue_targets_top_scope() {
        let mut stack = ReactionStack::default();
        stack.push_scope();
        stack.push_scope();

        assert!(!stack.enqueue(callback(1)));
        let top = stack.pop_scope().unwrap();
        assert_eq!(top.len(), 1);
        assert!(stack.pop_scope().unwrap().is_empty());
    }

    #[test]
    fn test_backup_queue_schedules_once() {
        let mut stack = ReactionStack::default();

        assert!(stack.enqueue(callback(1)));
        assert!(!stack.enqueue(callback(2)));

        let backup = stack.take_backup();
        let elements: Vec<NodeId> = backup.iter().map(Reaction::element).collect();
        assert_eq!(elements, vec![NodeId(1), NodeId(2)]);
        assert!(stack.enqueue(callback(3)));
    }

    #[test]
    fn test_with_reactions_restores_depth() {
        let mut tree = DomTree::new();
        let inner = tree.with_reactions(|tree| tree.with_reactions(|tree| tree.reaction_depth()));
        assert_eq!(inner, 2);
        assert_eq!(tree.reaction_depth(), 0);
    }

    #[test]
    fn test_depth_limit_joins_enclosing_scope() {
        let mut tree = DomTree::with_config(crate::DomConfig::default().with_max_reaction_depth(1));
        let depth = tree.with_reactions(|tree| tree.with_reactions(|tree| tree.reaction_depth()));
        assert_eq!(depth, 1);
    }
}
