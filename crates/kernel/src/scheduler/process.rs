use coopos_core::{KernelError, Pid, ThreadKey};
use indexmap::IndexMap;

use crate::persist::ThreadRecord;

use super::supervisor::Supervisor;
use super::thread::{Thread, ThreadExit, ThreadSpec};

/// What a program wants after its supervision turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Supervision {
    Continue,
    /// Tear the process (and its subtree) down.
    Exit,
}

/// Per-process behavior driven by the kernel once per cycle.
pub trait Program {
    /// Budget-gated housekeeping turn: diff governed collections, spawn
    /// threads, decide whether the process should keep living.
    fn supervise(&mut self, ctx: &mut Supervisor<'_>) -> Result<Supervision, KernelError>;

    /// Called after a thread has been removed from this process's table.
    fn on_thread_exit(&mut self, _exit: &ThreadExit) {}

    /// Rebuild a thread persisted by an earlier boot. `None` drops it.
    fn restore_thread(&self, _key: &str, _record: &ThreadRecord) -> Option<ThreadSpec> {
        None
    }
}

/// A named node of the supervision tree.
pub struct Process {
    pub(crate) pid: Pid,
    pub(crate) name: String,
    pub(crate) parent: Option<Pid>,
    pub(crate) children: Vec<Pid>,
    /// Work-item key -> thread, in creation order.
    pub(crate) threads: IndexMap<ThreadKey, Thread>,
    pub(crate) program: Option<Box<dyn Program>>,
}

impl Process {
    pub(crate) fn new(
        pid: Pid,
        name: String,
        parent: Option<Pid>,
        program: Option<Box<dyn Program>>,
    ) -> Self {
        Self {
            pid,
            name,
            parent,
            children: Vec::new(),
            threads: IndexMap::new(),
            program,
        }
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<Pid> {
        self.parent
    }

    pub fn children(&self) -> &[Pid] {
        &self.children
    }

    pub fn thread_count(&self) -> usize {
        self.threads.len()
    }

    pub fn thread_keys(&self) -> impl Iterator<Item = &str> {
        self.threads.keys().map(|k| k.as_str())
    }
}
