use std::collections::{BTreeMap, HashSet};

use coopos_core::{KernelConfig, Pid};
use tracing::info;
use uuid::Uuid;

use crate::lock::LockRegistry;
use crate::persist::{MemoryStore, StateStore};
use crate::scheduler::metrics::KernelMetrics;
use crate::scheduler::process::Process;
use crate::scheduler::thread::ThreadView;

/// The root of the supervision tree. Always present, never killed.
pub const ROOT: Pid = Pid(0);

/// Scores a ready thread; higher scores are resumed first.
pub type PriorityFn = Box<dyn Fn(&ThreadView) -> f64>;

/// The cooperative kernel. Owns every process, thread and lock, and runs
/// one [`run_cycle`](Kernel::run_cycle) per host tick.
pub struct Kernel {
    pub(super) config: KernelConfig,
    /// Distinguishes records written by this instance from a previous one.
    pub(super) boot_id: Uuid,
    pub(super) cycle: u64,
    pub(super) processes: BTreeMap<Pid, Process>,
    pub(super) next_pid: u32,
    pub(super) next_tid: u64,
    pub(super) locks: LockRegistry,
    pub(super) store: Box<dyn StateStore>,
    pub(super) priority: Option<PriorityFn>,
    pub(super) metrics: KernelMetrics,
    /// Processes whose persisted records have already been consulted.
    pub(super) rehydrated: HashSet<Pid>,
}

impl Kernel {
    /// Create a kernel backed by an empty in-memory store.
    pub fn new(config: KernelConfig) -> Self {
        Self::with_store(config, MemoryStore::new())
    }

    pub fn with_store(config: KernelConfig, store: impl StateStore + 'static) -> Self {
        let boot_id = Uuid::new_v4();
        info!(%boot_id, "kernel booted");

        let mut processes = BTreeMap::new();
        processes.insert(ROOT, Process::new(ROOT, String::new(), None, None));

        Self {
            config,
            boot_id,
            cycle: 0,
            processes,
            next_pid: 1,
            next_tid: 0,
            locks: LockRegistry::new(),
            store: Box::new(store),
            priority: None,
            metrics: KernelMetrics::default(),
            rehydrated: HashSet::new(),
        }
    }

    /// Resume threads by descending `score` instead of creation order.
    pub fn set_priority(&mut self, score: impl Fn(&ThreadView) -> f64 + 'static) {
        self.priority = Some(Box::new(score));
    }

    pub fn clear_priority(&mut self) {
        self.priority = None;
    }

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    pub fn boot_id(&self) -> Uuid {
        self.boot_id
    }

    /// Number of the most recently started cycle (0 before the first).
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn metrics(&self) -> &KernelMetrics {
        &self.metrics
    }

    pub fn locks(&self) -> &LockRegistry {
        &self.locks
    }

    pub fn store(&self) -> &dyn StateStore {
        self.store.as_ref()
    }

    /// Shut the kernel down, handing back its store for a later boot.
    pub fn into_store(self) -> Box<dyn StateStore> {
        info!(boot_id = %self.boot_id, cycles = self.cycle, "kernel stopped");
        self.store
    }

    pub fn process(&self, pid: Pid) -> Option<&Process> {
        self.processes.get(&pid)
    }

    pub fn process_count(&self) -> usize {
        self.processes.len()
    }

    pub fn find_child(&self, parent: Pid, name: &str) -> Option<Pid> {
        let parent = self.processes.get(&parent)?;
        parent
            .children
            .iter()
            .copied()
            .find(|pid| self.processes.get(pid).is_some_and(|p| p.name == name))
    }

    /// Slash-separated path of names from the root, e.g. `/legacy/creeps`.
    pub fn path(&self, pid: Pid) -> Option<String> {
        let mut names = Vec::new();
        let mut current = self.processes.get(&pid)?;
        while let Some(parent) = current.parent {
            names.push(current.name.as_str());
            current = self.processes.get(&parent)?;
        }
        names.reverse();
        Some(format!("/{}", names.join("/")))
    }

    /// Snapshots of a process's threads in creation order.
    pub fn threads(&self, pid: Pid) -> Vec<ThreadView> {
        self.processes
            .get(&pid)
            .map(|p| p.threads.values().map(|t| t.view(pid)).collect())
            .unwrap_or_default()
    }

    pub fn thread(&self, pid: Pid, key: &str) -> Option<ThreadView> {
        self.processes.get(&pid)?.threads.get(key).map(|t| t.view(pid))
    }

    /// Total live threads across every process.
    pub fn thread_count(&self) -> usize {
        self.processes.values().map(|p| p.threads.len()).sum()
    }

    /// Every process in supervision order: parents before children,
    /// children in creation order.
    pub fn tree_order(&self) -> Vec<Pid> {
        self.subtree(ROOT)
    }

    /// `pid` followed by all of its descendants, depth first.
    pub(super) fn subtree(&self, pid: Pid) -> Vec<Pid> {
        let mut order = Vec::new();
        let mut stack = vec![pid];
        while let Some(current) = stack.pop() {
            let Some(process) = self.processes.get(&current) else {
                continue;
            };
            order.push(current);
            stack.extend(process.children.iter().rev().copied());
        }
        order
    }
}
