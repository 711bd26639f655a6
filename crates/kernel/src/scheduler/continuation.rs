use coopos_core::{KernelError, Tid};

use crate::host::Host;
use crate::lock::LockRegistry;

/// What a continuation reports after one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// More work remains; resume on a later turn.
    Yield,
    /// Waiting for the named spinlock held by another thread.
    Blocked(String),
    /// Ran to completion.
    Done,
    /// The work item behind the thread no longer exists.
    Ceased,
}

/// A resumable computation, advanced one bounded unit of work per call.
///
/// The continuation *is* the suspended state: everything needed to pick up
/// where the previous step stopped lives in `self`. Returning an error marks
/// the step as failed; the scheduler isolates the failure to this thread.
pub trait Continuation {
    fn step(&mut self, ctx: &mut StepContext<'_>) -> Result<Step, KernelError>;

    /// Serializable snapshot written to the state store at the end of each
    /// cycle, used to rebuild the continuation after a restart.
    fn checkpoint(&self) -> Option<serde_json::Value> {
        None
    }
}

impl<C: Continuation + ?Sized> Continuation for Box<C> {
    fn step(&mut self, ctx: &mut StepContext<'_>) -> Result<Step, KernelError> {
        (**self).step(ctx)
    }

    fn checkpoint(&self) -> Option<serde_json::Value> {
        (**self).checkpoint()
    }
}

/// Everything a continuation may touch while it runs one step.
pub struct StepContext<'a> {
    pub tid: Tid,
    pub key: &'a str,
    pub cycle: u64,
    host: &'a mut dyn Host,
    locks: &'a mut LockRegistry,
}

impl<'a> StepContext<'a> {
    pub fn new(
        tid: Tid,
        key: &'a str,
        cycle: u64,
        host: &'a mut dyn Host,
        locks: &'a mut LockRegistry,
    ) -> Self {
        Self {
            tid,
            key,
            cycle,
            host,
            locks,
        }
    }

    pub fn host(&mut self) -> &mut dyn Host {
        &mut *self.host
    }

    pub fn locks(&mut self) -> &mut LockRegistry {
        &mut *self.locks
    }
}
