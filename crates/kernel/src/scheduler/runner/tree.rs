use coopos_core::{ExitReason, KernelError, Pid, Tid};
use tracing::{debug, info};

use crate::scheduler::process::{Process, Program};
use crate::scheduler::thread::{Thread, ThreadExit, ThreadSpec};

use super::{Kernel, ROOT};

impl Kernel {
    /// Start a supervised process under `parent`. Names are unique among
    /// siblings.
    pub fn spawn_process(
        &mut self,
        parent: Pid,
        name: &str,
        program: impl Program + 'static,
    ) -> Result<Pid, KernelError> {
        self.insert_process(parent, name, Some(Box::new(program)))
    }

    /// Start a process with no program. Useful as a grouping node or as a
    /// plain container for threads spawned by the caller.
    pub fn spawn_group(&mut self, parent: Pid, name: &str) -> Result<Pid, KernelError> {
        self.insert_process(parent, name, None)
    }

    pub(super) fn insert_process(
        &mut self,
        parent: Pid,
        name: &str,
        program: Option<Box<dyn Program>>,
    ) -> Result<Pid, KernelError> {
        if !self.processes.contains_key(&parent) {
            return Err(KernelError::ProcessNotFound(parent));
        }
        if self.find_child(parent, name).is_some() {
            return Err(KernelError::DuplicateProcess {
                parent,
                name: name.to_string(),
            });
        }

        let pid = Pid(self.next_pid);
        self.next_pid += 1;
        self.processes
            .insert(pid, Process::new(pid, name.to_string(), Some(parent), program));
        if let Some(p) = self.processes.get_mut(&parent) {
            p.children.push(pid);
        }
        info!(%pid, %parent, name, "spawned process");
        Ok(pid)
    }

    /// Tear down `pid` and its whole subtree, children first. Every live
    /// thread is cancelled (its exit callback runs) and the persisted
    /// records are removed.
    pub fn kill_process(&mut self, pid: Pid) -> Result<Vec<ThreadExit>, KernelError> {
        if pid == ROOT {
            return Err(KernelError::RootProcess);
        }
        if !self.processes.contains_key(&pid) {
            return Err(KernelError::ProcessNotFound(pid));
        }

        let mut doomed: Vec<(Pid, Option<String>)> = self
            .subtree(pid)
            .into_iter()
            .map(|p| (p, self.path(p)))
            .collect();
        doomed.reverse();

        let mut exits = Vec::new();
        for (victim, path) in doomed {
            let keys: Vec<String> = self
                .processes
                .get(&victim)
                .map(|p| p.threads.keys().cloned().collect())
                .unwrap_or_default();
            for key in keys {
                if let Some(exit) = self.remove_thread(victim, &key, ExitReason::Cancelled) {
                    exits.push(exit);
                }
            }
            if let Some(path) = path {
                self.store.remove(&path);
            }
            self.processes.remove(&victim);
            self.rehydrated.remove(&victim);
            debug!(pid = %victim, "process removed");
        }

        for process in self.processes.values_mut() {
            process.children.retain(|child| *child != pid);
        }
        info!(%pid, cancelled = exits.len(), "killed process");
        Ok(exits)
    }

    /// Move `pid` (with its subtree) under `new_parent`.
    pub fn reparent(&mut self, pid: Pid, new_parent: Pid) -> Result<(), KernelError> {
        if pid == ROOT {
            return Err(KernelError::RootProcess);
        }
        if !self.processes.contains_key(&pid) {
            return Err(KernelError::ProcessNotFound(pid));
        }
        if !self.processes.contains_key(&new_parent) {
            return Err(KernelError::ProcessNotFound(new_parent));
        }
        let subtree = self.subtree(pid);
        if subtree.contains(&new_parent) {
            return Err(KernelError::SupervisionCycle {
                pid,
                parent: new_parent,
            });
        }
        let name = self.processes[&pid].name.clone();
        if let Some(existing) = self.find_child(new_parent, &name) {
            if existing != pid {
                return Err(KernelError::DuplicateProcess {
                    parent: new_parent,
                    name,
                });
            }
            return Ok(());
        }

        // Records are keyed by path; they are rewritten at the end of the
        // next cycle under the new paths.
        for p in &subtree {
            if let Some(path) = self.path(*p) {
                self.store.remove(&path);
            }
        }

        let old_parent = self.processes[&pid].parent;
        if let Some(old) = old_parent.and_then(|op| self.processes.get_mut(&op)) {
            old.children.retain(|child| *child != pid);
        }
        if let Some(p) = self.processes.get_mut(&new_parent) {
            p.children.push(pid);
        }
        if let Some(p) = self.processes.get_mut(&pid) {
            p.parent = Some(new_parent);
        }
        info!(%pid, %new_parent, "reparented process");
        Ok(())
    }

    /// Add a thread to `pid` from outside its program.
    pub fn spawn_thread(&mut self, pid: Pid, spec: ThreadSpec) -> Result<Tid, KernelError> {
        let process = self
            .processes
            .get_mut(&pid)
            .ok_or(KernelError::ProcessNotFound(pid))?;
        if process.threads.contains_key(&spec.key) {
            return Err(KernelError::DuplicateThread(spec.key));
        }
        let tid = Tid(self.next_tid);
        self.next_tid += 1;
        debug!(%pid, %tid, key = %spec.key, "spawned thread");
        process.threads.insert(spec.key.clone(), Thread::new(tid, spec));
        self.metrics.record_spawn(1);
        Ok(tid)
    }

    /// Cancel a single thread.
    pub fn kill_thread(&mut self, pid: Pid, key: &str) -> Result<ThreadExit, KernelError> {
        if !self.processes.contains_key(&pid) {
            return Err(KernelError::ProcessNotFound(pid));
        }
        self.remove_thread(pid, key, ExitReason::Cancelled)
            .ok_or_else(|| KernelError::ThreadNotFound {
                pid,
                key: key.to_string(),
            })
    }

    /// Take a thread out of its process's table: release its locks, run its
    /// exit callback, then tell the program.
    pub(super) fn remove_thread(
        &mut self,
        pid: Pid,
        key: &str,
        reason: ExitReason,
    ) -> Option<ThreadExit> {
        let process = self.processes.get_mut(&pid)?;
        let thread = process.threads.shift_remove(key)?;

        let released = self.locks.release_all(thread.tid);
        if !released.is_empty() {
            debug!(%pid, key, locks = ?released, "released locks held by exiting thread");
        }

        let (exit, callback) = thread.finish(pid, reason);
        if let Some(callback) = callback {
            callback(&exit);
        }
        if let Some(program) = process.program.as_mut() {
            program.on_thread_exit(&exit);
        }

        self.metrics.record_exit(reason);
        debug!(%pid, key, %reason, steps = exit.steps, "thread exited");
        Some(exit)
    }
}
