use coopos_core::{ExitReason, Pid, ThreadKey, Tid};
use tracing::{debug, info, warn};

use crate::algorithms::priority_queue::{PriorityQueue, SortOrder};
use crate::budget::{has_capacity, CpuBudget};
use crate::host::Host;
use crate::persist::ProcessRecord;
use crate::scheduler::continuation::{Step, StepContext};
use crate::scheduler::metrics::{CycleEnd, CycleReport};
use crate::scheduler::process::Supervision;
use crate::scheduler::supervisor::{ChildCommand, Supervisor};
use crate::scheduler::thread::{Thread, ThreadView};

use super::{Kernel, ROOT};

impl Kernel {
    /// Run one execution cycle against `host`.
    ///
    /// Never starts a unit of work (supervision turn, spawn, or thread step)
    /// once less than `cpu_safety_margin` remains.
    pub fn run_cycle(&mut self, host: &mut dyn Host) -> CycleReport {
        self.cycle += 1;
        let mut report = CycleReport::new(self.cycle);

        self.rehydrate(&mut report);
        let supervised = self.supervise_all(host, &mut report);
        let end = self.resume_threads(host, &mut report);
        report.end = if supervised { end } else { CycleEnd::Exhausted };

        self.persist();
        report.cpu_used = host.used();
        self.metrics.record_cycle(&report);

        info!(
            cycle = report.cycle,
            resumed = report.resumed,
            spawned = report.spawned,
            faults = report.faults,
            end = ?report.end,
            cpu = report.cpu_used,
            "cycle finished"
        );
        report
    }

    /// Rebuild threads recorded by a previous boot, once per process.
    fn rehydrate(&mut self, report: &mut CycleReport) {
        let pending: Vec<Pid> = self
            .processes
            .keys()
            .copied()
            .filter(|pid| !self.rehydrated.contains(pid))
            .collect();

        for pid in pending {
            self.rehydrated.insert(pid);
            let Some(path) = self.path(pid) else {
                continue;
            };
            let record = match self.store.load(&path) {
                Ok(Some(record)) => record,
                Ok(None) => continue,
                Err(e) => {
                    warn!(error = %e, %path, "unreadable process record, ignoring");
                    continue;
                }
            };
            if record.boot_id == self.boot_id {
                continue;
            }

            let Some(process) = self.processes.get_mut(&pid) else {
                continue;
            };
            let Some(program) = process.program.as_ref() else {
                continue;
            };
            // reissue tids in the order the previous boot created them
            let mut saved_threads: Vec<_> = record.threads.iter().collect();
            saved_threads.sort_by_key(|(_, saved)| saved.tid);

            let mut restored = 0;
            for (key, saved) in saved_threads {
                if process.threads.contains_key(key) {
                    continue;
                }
                let Some(spec) = program.restore_thread(key, saved) else {
                    debug!(%path, key, "thread not restorable, dropping");
                    continue;
                };
                let tid = Tid(self.next_tid);
                self.next_tid += 1;
                let mut thread = Thread::new(tid, spec);
                thread.key = key.clone();
                thread.steps = saved.steps;
                thread.faults = saved.faults;
                process.threads.insert(key.clone(), thread);
                restored += 1;
            }
            report.restored += restored;
            info!(%path, restored, from_boot = %record.boot_id, "rehydrated process");
        }
    }

    /// Give each program its supervision turn. Returns `false` when the
    /// budget ran out before every process was supervised.
    fn supervise_all(&mut self, host: &mut dyn Host, report: &mut CycleReport) -> bool {
        let margin = self.config.cpu_safety_margin;
        let cycle = self.cycle;

        for pid in self.tree_order() {
            if !has_capacity(host, margin) {
                info!(%pid, "budget exhausted during supervision");
                return false;
            }
            let children = self.children_of(pid);
            let Some(process) = self.processes.get_mut(&pid) else {
                // torn down by an ancestor's exit earlier in this pass
                continue;
            };
            let Some(mut program) = process.program.take() else {
                continue;
            };

            let (result, spawned, suspended, commands) = {
                let mut sup = Supervisor::new(
                    pid,
                    cycle,
                    &mut *host,
                    &mut process.threads,
                    &mut self.next_tid,
                    margin,
                    &self.config.default_method,
                )
                .with_children(children);
                let result = program.supervise(&mut sup);
                let (spawned, suspended) = (sup.spawned(), sup.suspended());
                (result, spawned, suspended, sup.into_commands())
            };
            process.program = Some(program);

            report.spawned += spawned;
            self.metrics.record_spawn(spawned);
            self.apply_child_commands(pid, commands, report);

            match result {
                Ok(Supervision::Continue) => {}
                Ok(Supervision::Exit) if pid == ROOT => {
                    warn!("root program requested exit, ignoring");
                }
                Ok(Supervision::Exit) => {
                    info!(%pid, "program finished, tearing process down");
                    if let Ok(exits) = self.kill_process(pid) {
                        for exit in exits {
                            report.record_exit(exit.reason);
                        }
                    }
                }
                Err(e) => {
                    let name = self.path(pid).unwrap_or_else(|| pid.to_string());
                    warn!(error = %e, process = %name, "supervision failed");
                    report.faults += 1;
                    self.metrics.record_fault(&name);
                }
            }

            if suspended {
                return false;
            }
        }
        true
    }

    fn children_of(&self, pid: Pid) -> Vec<(Pid, String)> {
        let Some(process) = self.processes.get(&pid) else {
            return Vec::new();
        };
        process
            .children
            .iter()
            .filter_map(|child| self.processes.get(child).map(|p| (*child, p.name.clone())))
            .collect()
    }

    /// Carry out the child spawns and kills a program asked for.
    fn apply_child_commands(
        &mut self,
        parent: Pid,
        commands: Vec<ChildCommand>,
        report: &mut CycleReport,
    ) {
        for command in commands {
            match command {
                ChildCommand::Spawn { name, program } => {
                    if let Err(e) = self.insert_process(parent, &name, Some(program)) {
                        warn!(error = %e, %parent, %name, "child spawn refused");
                        report.faults += 1;
                    }
                }
                ChildCommand::Kill(child) => match self.kill_process(child) {
                    Ok(exits) => {
                        info!(%parent, %child, "child process killed by parent");
                        for exit in exits {
                            report.record_exit(exit.reason);
                        }
                    }
                    Err(e) => debug!(error = %e, %child, "child already gone"),
                },
            }
        }
    }

    /// Resume ready threads until the budget runs out or nobody can run.
    ///
    /// Passes repeat while a pass made progress, so a thread blocked on a
    /// lock released later in the cycle still gets its turn.
    fn resume_threads(&mut self, host: &mut dyn Host, report: &mut CycleReport) -> CycleEnd {
        let margin = self.config.cpu_safety_margin;
        let cycle = self.cycle;

        loop {
            let order = self.resume_order();
            if order.is_empty() {
                return CycleEnd::Idle;
            }

            let mut progressed = false;
            for (pid, key) in order {
                let Some(thread) = self.processes.get(&pid).and_then(|p| p.threads.get(&key))
                else {
                    continue;
                };
                if !thread.resumable_in(cycle) {
                    continue;
                }
                if let Some(lock) = &thread.waiting_on {
                    if self.locks.is_contended(lock, thread.tid) {
                        continue;
                    }
                }
                if !has_capacity(host, margin) {
                    return CycleEnd::Exhausted;
                }
                if self.resume(pid, &key, host, report) {
                    progressed = true;
                }
            }

            if !progressed {
                return CycleEnd::Idle;
            }
        }
    }

    /// Threads that may still run this cycle, in resumption order.
    fn resume_order(&self) -> Vec<(Pid, ThreadKey)> {
        let cycle = self.cycle;
        let mut ready: Vec<(Pid, &Thread)> = self
            .processes
            .iter()
            .flat_map(|(pid, p)| p.threads.values().map(move |t| (*pid, t)))
            .filter(|(_, t)| t.resumable_in(cycle))
            .collect();
        ready.sort_by_key(|(_, t)| t.tid);

        match &self.priority {
            None => ready
                .into_iter()
                .map(|(pid, t)| (pid, t.key.clone()))
                .collect(),
            Some(score) => {
                let mut queue =
                    PriorityQueue::new(|view: &ThreadView| score(view), SortOrder::Descending);
                for (pid, t) in ready {
                    queue.insert(t.view(pid));
                }
                queue
                    .into_vec()
                    .into_iter()
                    .map(|view| (view.pid, view.key))
                    .collect()
            }
        }
    }

    /// Step one thread. Returns `true` unless the thread only found its
    /// lock taken.
    fn resume(
        &mut self,
        pid: Pid,
        key: &str,
        host: &mut dyn Host,
        report: &mut CycleReport,
    ) -> bool {
        let cycle = self.cycle;
        let outcome = {
            let Some(thread) = self
                .processes
                .get_mut(&pid)
                .and_then(|p| p.threads.get_mut(key))
            else {
                return false;
            };
            let mut ctx = StepContext::new(thread.tid, &thread.key, cycle, host, &mut self.locks);
            thread.continuation.step(&mut ctx)
        };

        let Some(thread) = self
            .processes
            .get_mut(&pid)
            .and_then(|p| p.threads.get_mut(key))
        else {
            return false;
        };

        match outcome {
            Ok(Step::Yield) => {
                report.resumed += 1;
                thread.steps += 1;
                thread.faults = 0;
                thread.waiting_on = None;
                thread.last_resumed = Some(cycle);
            }
            Ok(Step::Blocked(lock)) => {
                report.blocked += 1;
                debug!(%pid, key, %lock, "waiting on lock");
                thread.waiting_on = Some(lock);
                return false;
            }
            Ok(Step::Done) => {
                report.resumed += 1;
                thread.steps += 1;
                self.finish_thread(pid, key, ExitReason::Completed, report);
            }
            Ok(Step::Ceased) => {
                report.resumed += 1;
                self.finish_thread(pid, key, ExitReason::Ceased, report);
            }
            Err(e) => {
                report.resumed += 1;
                report.faults += 1;
                thread.faults += 1;
                thread.waiting_on = None;
                thread.faulted_in = Some(cycle);
                let faults = thread.faults;
                warn!(error = %e, %pid, key, faults, "thread step failed");
                self.metrics.record_fault(key);

                let max = self.config.max_thread_faults;
                if max > 0 && faults >= max {
                    warn!(%pid, key, faults, "reaping thread after repeated failures");
                    self.finish_thread(pid, key, ExitReason::Faulted, report);
                }
            }
        }
        true
    }

    fn finish_thread(&mut self, pid: Pid, key: &str, reason: ExitReason, report: &mut CycleReport) {
        if let Some(exit) = self.remove_thread(pid, key, reason) {
            report.record_exit(exit.reason);
        }
    }

    /// Write every process's thread table to the store.
    fn persist(&mut self) {
        for pid in self.tree_order() {
            let Some(path) = self.path(pid) else {
                continue;
            };
            let Some(process) = self.processes.get(&pid) else {
                continue;
            };
            let record = ProcessRecord {
                boot_id: self.boot_id,
                cycle: self.cycle,
                threads: process
                    .threads
                    .iter()
                    .map(|(key, thread)| (key.clone(), thread.record()))
                    .collect(),
            };
            if let Err(e) = self.store.save(&path, &record) {
                warn!(error = %e, %path, "failed to persist process record");
            }
        }
    }
}
