//! Microtask Queue
//!
//! Backup reaction processing, mutation observer delivery and embedder jobs
//! all run from one FIFO at [`DomTree::perform_microtask_checkpoint`].

use std::collections::VecDeque;
use std::fmt;

use crate::{DomTree, ScriptError};

type Job = Box<dyn FnOnce(&mut DomTree) -> Result<(), ScriptError>>;

pub(crate) enum Microtask {
    ProcessBackupReactions,
    NotifyMutationObservers,
    Job(Job),
}

impl fmt::Debug for Microtask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProcessBackupReactions => f.write_str("ProcessBackupReactions"),
            Self::NotifyMutationObservers => f.write_str("NotifyMutationObservers"),
            Self::Job(_) => f.write_str("Job"),
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct MicrotaskQueue {
    tasks: VecDeque<Microtask>,
    performing_checkpoint: bool,
}

impl MicrotaskQueue {
    pub(crate) fn push(&mut self, task: Microtask) {
        self.tasks.push_back(task);
    }

    pub(crate) fn len(&self) -> usize {
        self.tasks.len()
    }
}

impl DomTree {
    /// Queue an embedder job to run at the next checkpoint
    pub fn queue_microtask(&mut self, job: impl FnOnce(&mut DomTree) -> Result<(), ScriptError> + 'static) {
        self.microtasks.push(Microtask::Job(Box::new(job)));
    }

    pub fn has_pending_microtasks(&self) -> bool {
        self.microtasks.len() > 0
    }

    /// Run queued microtasks until the queue is empty
    ///
    /// Tasks queued while the checkpoint runs are drained by it too. A nested
    /// call made from inside a microtask returns immediately.
    pub fn perform_microtask_checkpoint(&mut self) {
        if self.microtasks.performing_checkpoint {
            return;
        }
        self.microtasks.performing_checkpoint = true;

        while let Some(task) = self.microtasks.tasks.pop_front() {
            tracing::trace!(?task, "running microtask");
            match task {
                Microtask::ProcessBackupReactions => self.process_backup_reactions(),
                Microtask::NotifyMutationObservers => self.notify_mutation_observers(),
                Microtask::Job(job) => {
                    if let Err(err) = job(self) {
                        self.report_error(&err);
                    }
                }
            }
        }

        self.microtasks.performing_checkpoint = false;
    }
}
