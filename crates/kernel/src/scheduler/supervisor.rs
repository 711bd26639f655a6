use std::collections::HashSet;

use coopos_core::{KernelError, Pid, ThreadKey, Tid};
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::budget::has_capacity;
use crate::host::{item_id, Host};

use super::invoker::Invoker;
use super::process::Program;
use super::thread::{Thread, ThreadSpec};

/// Result of one [`Supervisor::spawn_missing_threads`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SpawnReport {
    pub spawned: usize,
    /// Items that had no usable identifier.
    pub skipped: usize,
    /// The budget ran out before every missing item got a thread.
    pub suspended: bool,
}

/// Change to the process's children requested during a supervision turn.
/// The kernel applies these once the turn is over.
pub(crate) enum ChildCommand {
    Spawn {
        name: String,
        program: Box<dyn Program>,
    },
    Kill(Pid),
}

/// A program's handle on its own process during a supervision turn.
pub struct Supervisor<'a> {
    pid: Pid,
    cycle: u64,
    host: &'a mut dyn Host,
    threads: &'a mut IndexMap<ThreadKey, Thread>,
    next_tid: &'a mut u64,
    margin: f64,
    default_method: &'a str,
    spawned: usize,
    suspended: bool,
    /// Live children as (pid, name) at the start of the turn.
    children: Vec<(Pid, String)>,
    commands: Vec<ChildCommand>,
}

impl<'a> Supervisor<'a> {
    pub(crate) fn new(
        pid: Pid,
        cycle: u64,
        host: &'a mut dyn Host,
        threads: &'a mut IndexMap<ThreadKey, Thread>,
        next_tid: &'a mut u64,
        margin: f64,
        default_method: &'a str,
    ) -> Self {
        Self {
            pid,
            cycle,
            host,
            threads,
            next_tid,
            margin,
            default_method,
            spawned: 0,
            suspended: false,
            children: Vec::new(),
            commands: Vec::new(),
        }
    }

    pub(crate) fn with_children(mut self, children: Vec<(Pid, String)>) -> Self {
        self.children = children;
        self
    }

    pub(crate) fn into_commands(self) -> Vec<ChildCommand> {
        self.commands
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn host(&mut self) -> &mut dyn Host {
        &mut *self.host
    }

    pub fn default_method(&self) -> &str {
        self.default_method
    }

    /// Whether the cycle still has room for another unit of work.
    pub fn has_capacity(&self) -> bool {
        has_capacity(&*self.host, self.margin)
    }

    pub fn is_tracked(&self, key: &str) -> bool {
        self.threads.contains_key(key)
    }

    pub fn thread_count(&self) -> usize {
        self.threads.len()
    }

    /// Threads spawned during this turn.
    pub fn spawned(&self) -> usize {
        self.spawned
    }

    /// Whether a spawn was held back this turn because the budget ran out.
    pub fn suspended(&self) -> bool {
        self.suspended
    }

    pub fn children(&self) -> &[(Pid, String)] {
        &self.children
    }

    /// Pid of the live child called `name`.
    pub fn child(&self, name: &str) -> Option<Pid> {
        self.children
            .iter()
            .find(|(_, n)| n == name)
            .map(|(pid, _)| *pid)
    }

    /// Start a child process running `program`. The child is created when
    /// this turn ends and first supervised on the next cycle.
    pub fn spawn_child(
        &mut self,
        name: &str,
        program: impl Program + 'static,
    ) -> Result<(), KernelError> {
        let pending = self.commands.iter().any(|c| match c {
            ChildCommand::Spawn { name: n, .. } => n == name,
            ChildCommand::Kill(_) => false,
        });
        if pending || self.child(name).is_some() {
            return Err(KernelError::DuplicateProcess {
                parent: self.pid,
                name: name.to_string(),
            });
        }
        self.commands.push(ChildCommand::Spawn {
            name: name.to_string(),
            program: Box::new(program),
        });
        Ok(())
    }

    /// Tear down the child `pid` and its subtree when this turn ends. Its
    /// threads exit as cancelled.
    pub fn kill_child(&mut self, pid: Pid) -> Result<(), KernelError> {
        if !self.children.iter().any(|(child, _)| *child == pid) {
            return Err(KernelError::ProcessNotFound(pid));
        }
        if !self.commands.iter().any(|c| matches!(c, ChildCommand::Kill(p) if *p == pid)) {
            self.commands.push(ChildCommand::Kill(pid));
        }
        Ok(())
    }

    /// Add a thread to this process. At most one thread may exist per key.
    pub fn spawn_thread(&mut self, spec: ThreadSpec) -> Result<Tid, KernelError> {
        if self.threads.contains_key(&spec.key) {
            return Err(KernelError::DuplicateThread(spec.key));
        }
        let tid = Tid(*self.next_tid);
        *self.next_tid += 1;
        debug!(pid = %self.pid, %tid, key = %spec.key, "spawned thread");
        self.threads.insert(spec.key.clone(), Thread::new(tid, spec));
        self.spawned += 1;
        Ok(tid)
    }

    /// Start an [`Invoker`] thread for every item of `items` that has no
    /// thread keyed by `item[id_key]` yet.
    ///
    /// The budget is checked before each spawn; once it runs out the call
    /// stops without spawning further and reports `suspended`. Items left
    /// over are picked up by a later call since the diff is recomputed.
    pub fn spawn_missing_threads(
        &mut self,
        items: &[Value],
        id_key: &str,
        target_collection: Option<&str>,
        method: &str,
    ) -> SpawnReport {
        let mut report = SpawnReport::default();
        let mut seen: HashSet<String> = HashSet::new();
        let mut missed = Vec::new();

        for item in items {
            let Some(id) = item_id(item, id_key) else {
                report.skipped += 1;
                continue;
            };
            if self.threads.contains_key(&id) || !seen.insert(id.clone()) {
                continue;
            }
            missed.push(id);
        }

        if missed.is_empty() {
            return report;
        }

        for id in missed {
            if !self.has_capacity() {
                report.suspended = true;
                self.suspended = true;
                info!(
                    pid = %self.pid,
                    spawned = report.spawned,
                    "budget exhausted, suspending spawn"
                );
                break;
            }
            let invoker = Invoker::new(id.clone(), target_collection, method);
            let label = match target_collection {
                Some(col) => format!("{col}/{id}"),
                None => id.clone(),
            };
            let spec = ThreadSpec::new(id, invoker).label(label);
            if self.spawn_thread(spec).is_ok() {
                report.spawned += 1;
            }
        }

        report
    }
}
