use coopos_core::{ExitReason, Pid, ThreadKey, Tid};
use serde::Serialize;

use crate::persist::ThreadRecord;

use super::continuation::Continuation;

/// Invoked exactly once when a thread leaves its process's thread table.
pub type ExitCallback = Box<dyn FnOnce(&ThreadExit)>;

/// Everything needed to start a thread.
pub struct ThreadSpec {
    pub key: ThreadKey,
    pub label: String,
    pub continuation: Box<dyn Continuation>,
    pub on_exit: Option<ExitCallback>,
}

impl ThreadSpec {
    pub fn new(key: impl Into<ThreadKey>, continuation: impl Continuation + 'static) -> Self {
        let key = key.into();
        Self {
            label: key.clone(),
            key,
            continuation: Box::new(continuation),
            on_exit: None,
        }
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn on_exit(mut self, callback: impl FnOnce(&ThreadExit) + 'static) -> Self {
        self.on_exit = Some(Box::new(callback));
        self
    }
}

/// A live entry in a process's thread table.
pub struct Thread {
    pub(crate) tid: Tid,
    pub(crate) key: ThreadKey,
    pub(crate) label: String,
    pub(crate) continuation: Box<dyn Continuation>,
    pub(crate) on_exit: Option<ExitCallback>,
    pub(crate) steps: u64,
    /// Consecutive failed steps.
    pub(crate) faults: u32,
    pub(crate) waiting_on: Option<String>,
    pub(crate) last_resumed: Option<u64>,
    pub(crate) faulted_in: Option<u64>,
}

impl Thread {
    pub(crate) fn new(tid: Tid, spec: ThreadSpec) -> Self {
        Self {
            tid,
            key: spec.key,
            label: spec.label,
            continuation: spec.continuation,
            on_exit: spec.on_exit,
            steps: 0,
            faults: 0,
            waiting_on: None,
            last_resumed: None,
            faulted_in: None,
        }
    }

    pub fn tid(&self) -> Tid {
        self.tid
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Whether the scheduler may still resume this thread in `cycle`.
    pub(crate) fn resumable_in(&self, cycle: u64) -> bool {
        self.last_resumed != Some(cycle) && self.faulted_in != Some(cycle)
    }

    pub(crate) fn view(&self, pid: Pid) -> ThreadView {
        ThreadView {
            pid,
            tid: self.tid,
            key: self.key.clone(),
            label: self.label.clone(),
            steps: self.steps,
            faults: self.faults,
            waiting_on: self.waiting_on.clone(),
        }
    }

    pub(crate) fn record(&self) -> ThreadRecord {
        ThreadRecord {
            tid: self.tid.0,
            label: self.label.clone(),
            steps: self.steps,
            faults: self.faults,
            waiting_on: self.waiting_on.clone(),
            checkpoint: self.continuation.checkpoint(),
        }
    }

    /// Consume the thread, producing its exit notice and pending callback.
    pub(crate) fn finish(self, pid: Pid, reason: ExitReason) -> (ThreadExit, Option<ExitCallback>) {
        let exit = ThreadExit {
            pid,
            tid: self.tid,
            key: self.key,
            label: self.label,
            reason,
            steps: self.steps,
        };
        (exit, self.on_exit)
    }
}

/// Read-only snapshot of a thread, handed to priority functions and callers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThreadView {
    pub pid: Pid,
    pub tid: Tid,
    pub key: ThreadKey,
    pub label: String,
    pub steps: u64,
    pub faults: u32,
    pub waiting_on: Option<String>,
}

/// Notice delivered to exit callbacks and process programs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThreadExit {
    pub pid: Pid,
    pub tid: Tid,
    pub key: ThreadKey,
    pub label: String,
    pub reason: ExitReason,
    pub steps: u64,
}
